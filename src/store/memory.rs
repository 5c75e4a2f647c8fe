use crate::Error;
use crate::store::{RecordStore, StoredRecord, WriteDate, utc_now};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredValue {
    payload: Vec<u8>,
    write_date: WriteDate,
}

/// An in-memory record store.
///
/// Keeps the same write-date rules as the Postgres store: upserts and
/// touches never move a write date backwards.
///
/// ### Note
///
/// Do not use this in a production environment.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` verbatim, write date included.
    ///
    /// Useful to seed fixtures, or records carried over from another store.
    pub fn insert_record(&self, record: StoredRecord) {
        self.data.insert(
            record.id,
            StoredValue {
                payload: record.payload,
                write_date: record.write_date,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The later of the stored write date and `now`; unparsable dates lose.
fn advance(current: &WriteDate, now: time::PrimitiveDateTime) -> WriteDate {
    match current.normalize() {
        Ok(ts) if ts > now => WriteDate::Timestamp(ts),
        _ => WriteDate::Timestamp(now),
    }
}

impl RecordStore for MemoryStore {
    async fn setup(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn upsert(&self, id: &str, payload: &[u8]) -> Result<(), Error> {
        let now = utc_now();
        self.data
            .entry(id.to_string())
            .and_modify(|value| {
                value.payload = payload.to_vec();
                value.write_date = advance(&value.write_date, now);
            })
            .or_insert_with(|| StoredValue {
                payload: payload.to_vec(),
                write_date: WriteDate::Timestamp(now),
            });
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<StoredRecord>, Error> {
        Ok(self.data.get(id).map(|value| StoredRecord {
            id: id.to_string(),
            payload: value.payload.clone(),
            write_date: value.write_date.clone(),
        }))
    }

    async fn touch(&self, id: &str) -> Result<bool, Error> {
        let now = utc_now();
        match self.data.get_mut(id) {
            Some(mut value) => {
                value.write_date = advance(&value.write_date, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        Ok(self.data.remove(id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>, Error> {
        Ok(self.data.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn delete_expired(&self, retention: Duration) -> Result<u64, Error> {
        let retention = time::Duration::try_from(retention).unwrap_or(time::Duration::MAX);
        let now = utc_now();
        let before = self.data.len();
        // records whose date cannot be read are swept as well
        self.data.retain(|_, value| match value.write_date.normalize() {
            Ok(ts) => now - ts <= retention,
            Err(_) => false,
        });
        Ok(before.saturating_sub(self.data.len()) as u64)
    }
}
