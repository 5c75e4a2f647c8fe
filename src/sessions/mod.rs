//! The session store: validation, payload codec, sliding expiry and retries
//! on top of a [`RecordStore`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::codec::{Codec, DefaultCodec};
use crate::config::{DEFAULT_RETENTION, StoreConfig};
use crate::retry::RetryPolicy;
use crate::store::{RecordStore, StoredRecord};
use crate::{Error, Id, Session};

/// A durable session store.
///
/// Cheap to clone; clones share the same record store.
///
/// # Example
///
/// ```rust
/// use sessionstore::{Id, SessionMap, SessionStore};
/// use sessionstore::store::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), sessionstore::Error> {
/// let store = SessionStore::new(MemoryStore::new());
/// store.initialize().await?;
///
/// let id = Id::default();
/// let mut data = SessionMap::new();
/// data.insert("user", &1u32)?;
/// store.save(&id, &data).await?;
///
/// let session = store.get::<SessionMap>(&id.to_string()).await?;
/// assert!(!session.is_new());
/// assert_eq!(session.data().get::<u32>("user")?, Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionStore<S, C = DefaultCodec> {
    store: Arc<S>,
    codec: Arc<C>,
    retry: RetryPolicy,
    retention: Duration,
}

impl<S, C> Clone for SessionStore<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
            retry: self.retry,
            retention: self.retention,
        }
    }
}

impl<S: RecordStore> SessionStore<S> {
    /// Wraps `store` with the default codec, 5 attempts per operation and a
    /// 7 day retention window. Performs no I/O.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            codec: Arc::new(DefaultCodec),
            retry: RetryPolicy::default(),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Wraps `store` with the retry and retention settings of `config`.
    pub fn from_config(store: S, config: &StoreConfig) -> Self {
        Self::new(store)
            .with_retry_policy(config.retry_policy())
            .with_retention(config.retention())
    }
}

impl<S, C> SessionStore<S, C>
where
    S: RecordStore,
    C: Codec,
{
    /// Replaces the payload codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> SessionStore<S, C2> {
        SessionStore {
            store: self.store,
            codec: Arc::new(codec),
            retry: self.retry,
            retention: self.retention,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets how long a record may go unwritten before [`clean`](Self::clean)
    /// removes it.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Creates the backing database and table if they are missing.
    ///
    /// Idempotent; meant to run once at process start.
    #[tracing::instrument(name = "initializing session store", skip(self))]
    pub async fn initialize(&self) -> Result<(), Error> {
        self.retry.run("initialize", || self.store.setup()).await
    }

    /// Stores `data` under `id`, creating the record or replacing it.
    ///
    /// Concurrent saves of the same id are last-writer-wins.
    #[tracing::instrument(name = "saving session", skip_all)]
    pub async fn save<T>(&self, id: &Id, data: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let payload = self.codec.encode(data)?;
        let key = id.to_string();
        self.retry
            .run("save", || self.store.upsert(&key, &payload))
            .await
    }

    /// Loads the session stored under `sid`.
    ///
    /// Never fails because of what is (or is not) stored:
    ///
    /// - a `sid` that is not a valid [`Id`] yields a new session under a
    ///   freshly generated id, without querying storage;
    /// - an unknown `sid` yields a new, empty session for that id;
    /// - a payload that cannot be decoded yields an empty session for that
    ///   id, marked as not new, and the failure is logged.
    ///
    /// A record last written on an earlier (UTC) day gets its write date
    /// moved to now, which extends its retention without changing it.
    ///
    /// Only connection failures that outlast the retry budget, or
    /// non-transient storage errors, are returned.
    #[tracing::instrument(name = "loading session", skip_all)]
    pub async fn get<T>(&self, sid: &str) -> Result<Session<T>, Error>
    where
        T: DeserializeOwned + Default,
    {
        let Ok(id) = sid.parse::<Id>() else {
            tracing::debug!("invalid session id, starting a new session");
            return Ok(Session::generate());
        };

        let key = id.to_string();
        let Some(record) = self.retry.run("get", || self.store.fetch(&key)).await? else {
            return Ok(Session::new(id));
        };

        match self.open(&record).await {
            Ok(data) => Ok(Session::stored(id, data)),
            Err(err) => {
                tracing::error!(err = %err, "error fetching session payload");
                Ok(Session::emptied(id))
            }
        }
    }

    async fn open<T: DeserializeOwned>(&self, record: &StoredRecord) -> Result<T, Error> {
        let write_date = record.write_date.normalize()?;
        if write_date.date() != OffsetDateTime::now_utc().date() {
            self.heartbeat(&record.id).await;
        }
        self.codec.decode(&record.payload)
    }

    async fn heartbeat(&self, key: &str) {
        match self.retry.run("touch", || self.store.touch(key)).await {
            Ok(true) => tracing::debug!("session write date refreshed"),
            // deleted since it was fetched; the delete wins
            Ok(false) => tracing::debug!("session vanished before its write date was refreshed"),
            Err(err) => tracing::warn!(err = %err, "failed to refresh session write date"),
        }
    }

    /// Deletes the session stored under `id`.
    ///
    /// Returns `true` if there was one.
    #[tracing::instrument(name = "deleting session", skip_all)]
    pub async fn delete(&self, id: &Id) -> Result<bool, Error> {
        let key = id.to_string();
        self.retry.run("delete", || self.store.delete(&key)).await
    }

    /// Returns the ids of all stored sessions, in no particular order.
    ///
    /// Stored keys that are not valid ids are skipped.
    #[tracing::instrument(name = "listing sessions", skip(self))]
    pub async fn list_ids(&self) -> Result<Vec<Id>, Error> {
        let keys = self.retry.run("list", || self.store.list_ids()).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| match key.parse::<Id>() {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(key = %key, err = %err, "skipping stored key that is not a session id");
                    None
                }
            })
            .collect())
    }

    /// Deletes every session last written more than the retention window
    /// ago. A session exactly at the edge of the window is kept.
    ///
    /// Returns the number of sessions removed.
    #[tracing::instrument(name = "cleaning expired sessions", skip(self))]
    pub async fn clean(&self) -> Result<u64, Error> {
        let retention = self.retention;
        let removed = self
            .retry
            .run("clean", || self.store.delete_expired(retention))
            .await?;
        if removed > 0 {
            tracing::info!(removed, "removed expired sessions");
        }
        Ok(removed)
    }

    /// Runs [`clean`](Self::clean) every `interval` on the current tokio
    /// runtime until the returned handle is aborted.
    ///
    /// The first sweep happens immediately.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = store.clean().await {
                    tracing::error!(err = %err, "failed to clean expired sessions");
                }
            }
        })
    }
}
