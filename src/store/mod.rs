use crate::Error;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "postgres-store")]
pub mod postgres;

pub mod memory;
pub use memory::MemoryStore;

mod record;
pub use record::{StoredRecord, WriteDate, utc_now};

/// Raw persistence of session records.
///
/// Every call acquires its own connection, runs a single statement and
/// releases the connection before returning, on error paths too. Retries,
/// key validation and payload decoding live one level up, in
/// [`SessionStore`](crate::SessionStore).
pub trait RecordStore: Send + Sync + 'static {
    /// Creates whatever the store needs (database, table) if it is missing.
    /// Safe to call on every start.
    fn setup(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Inserts the record for `id`, or replaces its payload, stamping the
    /// write date with the current UTC time.
    fn upsert(&self, id: &str, payload: &[u8]) -> impl Future<Output = Result<(), Error>> + Send;

    fn fetch(&self, id: &str) -> impl Future<Output = Result<Option<StoredRecord>, Error>> + Send;

    /// Moves the write date of `id` to now without touching its payload.
    ///
    /// Returns `false` if there is no such record.
    fn touch(&self, id: &str) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Returns `true` if a record was deleted.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool, Error>> + Send;

    fn list_ids(&self) -> impl Future<Output = Result<Vec<String>, Error>> + Send;

    /// Deletes every record last written more than `retention` ago and
    /// returns how many were removed.
    fn delete_expired(&self, retention: Duration) -> impl Future<Output = Result<u64, Error>> + Send;
}
