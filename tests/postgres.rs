#![cfg(feature = "postgres-store")]

mod common;

#[cfg(test)]
mod tests {
    use super::*;

    use common::*;
    use sessionstore::sqlx;
    use sessionstore::sqlx::postgres::PgConnectOptions;
    use sessionstore::store::RecordStore;
    use sessionstore::store::postgres::{PostgresStore, PostgresStoreBuilder};
    use sessionstore::{Codec, DefaultCodec, Id, Session, SessionStore};
    use std::time::Duration;

    const TABLE: &str = "sessions_test";

    /// Returns `None` when `DATABASE_URL` is not set, so the suite can run
    /// without a server.
    fn connect_options() -> Option<PgConnectOptions> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping postgres test");
            return None;
        };
        Some(database_url.parse().unwrap())
    }

    async fn setup_store(table: &str) -> Option<SessionStore<PostgresStore>> {
        let options = connect_options()?;
        let database_name = options
            .get_database()
            .unwrap_or("session_store")
            .to_string();

        let store = PostgresStoreBuilder::new(options)
            .database_name(database_name)
            .table_name(table)
            .build()
            .unwrap();
        let sessions = SessionStore::new(store);

        // the database may not exist yet on a fresh server
        sessions.initialize().await.unwrap();

        // Clean up table before each test run
        let store = sessions.store();
        sqlx::query(&format!("drop table if exists {}", store.table()))
            .execute(store.pool())
            .await
            .unwrap();

        sessions.initialize().await.unwrap();
        Some(sessions)
    }

    #[tokio::test]
    async fn test_list_and_delete_scenario() {
        let Some(store) = setup_store(TABLE).await else {
            return;
        };
        let id = Id::default();
        let data = create_test_session();

        store.save(&id, &data).await.unwrap();
        assert!(store.list_ids().await.unwrap().contains(&id));

        let session: Session<TestSession> = store.get(&id.to_string()).await.unwrap();
        assert_eq!(session.data(), &data);

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.list_ids().await.unwrap().contains(&id));

        let session: Session<TestSession> = store.get(&id.to_string()).await.unwrap();
        assert!(session.is_new());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let Some(store) = setup_store("sessions_test_upsert").await else {
            return;
        };
        let id = Id::default();
        let mut updated = create_test_session();
        updated.preferences.theme = "light".to_string();

        store.save(&id, &create_test_session()).await.unwrap();
        store.save(&id, &updated).await.unwrap();

        let session: Session<TestSession> = store.get(&id.to_string()).await.unwrap();
        assert_eq!(session.into_data(), updated);
        assert_eq!(store.list_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let Some(store) = setup_store("sessions_test_init").await else {
            return;
        };
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_record_is_touched_and_expired_record_cleaned() {
        let Some(store) = setup_store("sessions_test_expiry").await else {
            return;
        };
        let stale = Id::default();
        let expired = Id::default();
        let data = create_test_session();
        store.save(&stale, &data).await.unwrap();
        store.save(&expired, &data).await.unwrap();

        let table = store.store().table().to_string();
        let pool = store.store().pool().clone();
        sqlx::query(&format!(
            "update {table} set write_date = write_date - interval '3 days' where id = $1"
        ))
        .bind(stale.to_string())
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(&format!(
            "update {table} set write_date = write_date - interval '7 days 1 second' where id = $1"
        ))
        .bind(expired.to_string())
        .execute(&pool)
        .await
        .unwrap();

        let session: Session<TestSession> = store.get(&stale.to_string()).await.unwrap();
        assert_eq!(session.into_data(), data);
        let record = store.store().fetch(&stale.to_string()).await.unwrap().unwrap();
        let write_date = record.write_date.normalize().unwrap();
        assert_eq!(write_date.date(), sessionstore::store::utc_now().date());

        assert_eq!(store.clean().await.unwrap(), 1);
        let ids = store.list_ids().await.unwrap();
        assert!(ids.contains(&stale));
        assert!(!ids.contains(&expired));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let options = PgConnectOptions::new().host("127.0.0.1").port(1);
        let store = PostgresStoreBuilder::new(options)
            .pool_options(
                sqlx::postgres::PgPoolOptions::new().acquire_timeout(Duration::from_millis(200)),
            )
            .build()
            .unwrap();

        let err = store.upsert(&Id::default().to_string(), b"x").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_initialize_creates_missing_database() {
        let Some(options) = connect_options() else {
            return;
        };
        let database_name = format!("sessionstore_test_{}", rand::random::<u32>());
        let store = PostgresStoreBuilder::new(options.clone())
            .database_name(&database_name)
            .table_name(TABLE)
            .build()
            .unwrap();
        let sessions = SessionStore::new(store);

        sessions.initialize().await.unwrap();
        sessions.initialize().await.unwrap();

        let id = Id::default();
        let data = create_test_session();
        sessions.save(&id, &data).await.unwrap();
        let session: Session<TestSession> = sessions.get(&id.to_string()).await.unwrap();
        assert_eq!(session.into_data(), data);

        sessions.store().pool().close().await;
        let maintenance = sqlx::PgPool::connect_with(options.database("postgres"))
            .await
            .unwrap();
        sqlx::query(&format!("drop database if exists \"{database_name}\""))
            .execute(&maintenance)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_text_write_dates_are_touched_and_cleaned() {
        let Some(store) = setup_store("sessions_test_text").await else {
            return;
        };
        let table = store.store().table().to_string();
        let pool = store.store().pool().clone();

        sqlx::query(&format!("drop table {table}"))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(&format!(
            "create table {table} (id text primary key, write_date text not null, payload bytea not null)"
        ))
        .execute(&pool)
        .await
        .unwrap();

        let data = create_test_session();
        let payload = DefaultCodec.encode(&data).unwrap();
        let stale = Id::default();
        let expired = Id::default();
        let unreadable = Id::default();
        for (id, write_date) in [
            (&stale, "2020-01-31 08:15:00.250000"),
            (&expired, "2020-01-31 08:15:00"),
            (&unreadable, "last tuesday"),
        ] {
            sqlx::query(&format!(
                "insert into {table} (id, write_date, payload) values ($1, $2, $3)"
            ))
            .bind(id.to_string())
            .bind(write_date)
            .bind(payload.clone())
            .execute(&pool)
            .await
            .unwrap();
        }

        let session: Session<TestSession> = store.get(&stale.to_string()).await.unwrap();
        assert_eq!(session.into_data(), data);
        let record = store.store().fetch(&stale.to_string()).await.unwrap().unwrap();
        assert!(matches!(record.write_date, sessionstore::store::WriteDate::Text(_)));
        let write_date = record.write_date.normalize().unwrap();
        assert_eq!(write_date.date(), sessionstore::store::utc_now().date());

        // an upsert over an unreadable date replaces it
        store.save(&unreadable, &data).await.unwrap();
        let record = store.store().fetch(&unreadable.to_string()).await.unwrap().unwrap();
        assert!(record.write_date.normalize().is_ok());
        sqlx::query(&format!("update {table} set write_date = 'last tuesday' where id = $1"))
            .bind(unreadable.to_string())
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(store.clean().await.unwrap(), 2);
        assert_eq!(store.list_ids().await.unwrap(), vec![stale]);
    }
}
