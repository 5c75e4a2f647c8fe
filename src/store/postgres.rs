use crate::config::{DEFAULT_DATABASE_NAME, DEFAULT_TABLE_NAME};
use crate::{Error, StoreConfig};
use crate::store::{RecordStore, StoredRecord, WriteDate};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection, PgPool, Postgres, Row};
use std::time::Duration;
use time::PrimitiveDateTime;

/// Database connected to when the session database has to be created.
const MAINTENANCE_DATABASE: &str = "postgres";

// invalid_catalog_name: the database does not exist
const MISSING_DATABASE: &str = "3D000";
// duplicate_database: someone else created it first
const DUPLICATE_DATABASE: &str = "42P04";

/// A builder for creating a `PostgresStore`.
///
/// Building never touches the server: the pool connects lazily, and the
/// database and table are only created by [`RecordStore::setup`].
#[derive(Debug)]
pub struct PostgresStoreBuilder {
    options: PgConnectOptions,
    pool_options: PoolOptions<Postgres>,
    database_name: String,
    table_name: String,
}

impl PostgresStoreBuilder {
    /// Creates a new builder from connection options and default names.
    ///
    /// The database name set on `options` is ignored; see
    /// [`database_name`](Self::database_name).
    pub fn new(options: PgConnectOptions) -> Self {
        Self {
            options,
            pool_options: PgPoolOptions::new(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Creates a builder using the names from `config`.
    pub fn from_config(options: PgConnectOptions, config: &StoreConfig) -> Self {
        Self::new(options)
            .database_name(config.database_name.clone())
            .table_name(config.table_name.clone())
    }

    /// Sets the database holding the session table. Defaults to "session_store".
    pub fn database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }

    /// Sets a custom table name for the session store. Defaults to "sessions".
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Overrides the pool settings (size, acquire timeout, ...).
    pub fn pool_options(mut self, pool_options: PoolOptions<Postgres>) -> Self {
        self.pool_options = pool_options;
        self
    }

    pub fn build(self) -> Result<PostgresStore, Error> {
        if self.database_name.is_empty() {
            return Err(Error::Config("database name must not be empty".into()));
        }
        if self.table_name.is_empty() {
            return Err(Error::Config("table name must not be empty".into()));
        }

        let options = self.options.database(&self.database_name);
        let pool = self.pool_options.connect_lazy_with(options.clone());

        Ok(PostgresStore {
            pool,
            options,
            database_name: self.database_name,
            table: quote_ident(&self.table_name),
        })
    }
}

/// A Postgres-backed record store.
///
/// Records live in a single table:
///
/// ```sql
/// create table if not exists "sessions" (
///     id text primary key,
///     write_date timestamp not null,
///     payload bytea not null
/// );
/// ```
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    options: PgConnectOptions,
    database_name: String,
    table: String,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn has_code(err: &Error, code: &str) -> bool {
    err.code() == Some(code)
}

/// `column` read as a timestamp, for both `timestamp` and legacy `text`
/// columns. Null when a text column holds something other than
/// `YYYY-MM-DD HH:MM:SS[.ffffff]`, the same shapes `WriteDate::normalize`
/// accepts.
fn readable_date(column: &str) -> String {
    format!(
        r"(case
            when pg_typeof({column}) <> 'text'::regtype then {column}::timestamp
            when {column}::text ~ '^\d{{4}}-\d{{2}}-\d{{2}} \d{{2}}:\d{{2}}:\d{{2}}(\.\d+)?$'
                then {column}::text::timestamp
        end)"
    )
}

async fn close(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        tracing::debug!(err = %err, "failed to close setup connection");
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => Error::Connection(err.to_string()),
            sqlx::Error::Database(db) => Error::Database {
                code: db.code().map(|code| code.into_owned()),
                message: db.message().to_string(),
            },
            other => Error::Backend(other.to_string()),
        }
    }
}

impl PostgresStore {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// The quoted table name used in statements.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn create_table(&self) -> Result<(), Error> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        let result = conn
            .execute(
                format!(
                    r#"
                    create table if not exists {table} (
                        id text primary key,
                        write_date timestamp not null,
                        payload bytea not null
                    )
                    "#,
                    table = self.table
                )
                .as_str(),
            )
            .await;
        close(conn).await;
        result?;
        Ok(())
    }

    async fn create_database(&self) -> Result<(), Error> {
        let options = self.options.clone().database(MAINTENANCE_DATABASE);
        let mut conn = PgConnection::connect_with(&options).await?;
        let result = conn
            .execute(
                format!(
                    "create database {} encoding 'UTF8' template template0",
                    quote_ident(&self.database_name)
                )
                .as_str(),
            )
            .await;
        close(conn).await;

        match result {
            Ok(_) => {
                tracing::info!(database = %self.database_name, "created session database");
                Ok(())
            }
            Err(err) => {
                let err = Error::from(err);
                if has_code(&err, DUPLICATE_DATABASE) {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

impl RecordStore for PostgresStore {
    async fn setup(&self) -> Result<(), Error> {
        match self.create_table().await {
            Err(err) if has_code(&err, MISSING_DATABASE) => {
                tracing::info!(
                    database = %self.database_name,
                    "session database does not exist, creating it"
                );
                self.create_database().await?;
                self.create_table().await
            }
            result => result,
        }
    }

    async fn upsert(&self, id: &str, payload: &[u8]) -> Result<(), Error> {
        // greatest() skips nulls, so an unreadable stored date is replaced
        let query = format!(
            r#"
            insert into {table} (id, write_date, payload)
            values ($1, now() at time zone 'utc', $2)
            on conflict (id) do update
            set
                payload = excluded.payload,
                write_date = greatest({stored}, now() at time zone 'utc')
            "#,
            table = self.table,
            stored = readable_date(&format!("{}.write_date", self.table))
        );

        let mut conn = self.pool.acquire().await?;
        sqlx::query(&query)
            .bind(id)
            .bind(payload)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<StoredRecord>, Error> {
        let query = format!(
            "select payload, write_date from {table} where id = $1",
            table = self.table
        );

        let mut conn = self.pool.acquire().await?;
        let Some(row) = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let payload: Vec<u8> = row.try_get("payload")?;
        let write_date = match row.try_get::<PrimitiveDateTime, _>("write_date") {
            Ok(ts) => WriteDate::Timestamp(ts),
            // tables created by older tools may keep the date as text
            Err(sqlx::Error::ColumnDecode { .. }) => {
                tracing::debug!("write_date is text");
                WriteDate::Text(row.try_get("write_date")?)
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Some(StoredRecord {
            id: id.to_string(),
            payload,
            write_date,
        }))
    }

    async fn touch(&self, id: &str) -> Result<bool, Error> {
        let query = format!(
            r#"
            update {table}
            set write_date = greatest({stored}, now() at time zone 'utc')
            where id = $1
            "#,
            table = self.table,
            stored = readable_date("write_date")
        );

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&query).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let query = format!("delete from {table} where id = $1", table = self.table);

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&query).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_ids(&self) -> Result<Vec<String>, Error> {
        let query = format!("select id from {table}", table = self.table);

        let mut conn = self.pool.acquire().await?;
        let ids: Vec<String> = sqlx::query_scalar(&query).fetch_all(&mut *conn).await?;
        Ok(ids)
    }

    async fn delete_expired(&self, retention: Duration) -> Result<u64, Error> {
        // rows whose date cannot be read are swept as well
        let query = format!(
            r#"
            delete from {table}
            where coalesce(
                (now() at time zone 'utc') - {stored} > make_interval(secs => $1),
                true
            )
            "#,
            table = self.table,
            stored = readable_date("write_date")
        );

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&query)
            .bind(retention.as_secs_f64())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
