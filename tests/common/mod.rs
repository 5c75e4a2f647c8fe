#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sessionstore::Error;
use sessionstore::store::{MemoryStore, RecordStore, StoredRecord};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct TestUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct TestSession {
    pub user: TestUser,
    pub preferences: TestPreferences,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct TestPreferences {
    pub theme: String,
    pub language: String,
}

pub fn create_test_session() -> TestSession {
    TestSession {
        user: TestUser {
            id: 1,
            name: "Test User".to_string(),
        },
        preferences: TestPreferences {
            theme: "dark".to_string(),
            language: "en".to_string(),
        },
    }
}

/// A [`MemoryStore`] that drops the connection on its first `failures`
/// calls, and counts every call it receives.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
    touch_failures: AtomicU32,
    calls: AtomicU32,
    permanent: bool,
}

impl FlakyStore {
    pub fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    /// Fails with a non-transient error instead.
    pub fn broken(failures: u32) -> Self {
        Self {
            permanent: true,
            ..Self::new(failures)
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, failures: u32) {
        self.failures.store(failures, Ordering::SeqCst);
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Drops the connection on the next `failures` touches only.
    pub fn fail_touches(&self, failures: u32) {
        self.touch_failures.store(failures, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        match (failing, self.permanent) {
            (false, _) => Ok(()),
            (true, false) => Err(Error::Connection("server closed the connection".into())),
            (true, true) => Err(Error::Backend("relation does not exist".into())),
        }
    }
}

impl RecordStore for FlakyStore {
    async fn setup(&self) -> Result<(), Error> {
        self.enter()?;
        self.inner.setup().await
    }

    async fn upsert(&self, id: &str, payload: &[u8]) -> Result<(), Error> {
        self.enter()?;
        self.inner.upsert(id, payload).await
    }

    async fn fetch(&self, id: &str) -> Result<Option<StoredRecord>, Error> {
        self.enter()?;
        self.inner.fetch(id).await
    }

    async fn touch(&self, id: &str) -> Result<bool, Error> {
        self.enter()?;
        if self
            .touch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Connection("server closed the connection".into()));
        }
        self.inner.touch(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        self.enter()?;
        self.inner.delete(id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>, Error> {
        self.enter()?;
        self.inner.list_ids().await
    }

    async fn delete_expired(&self, retention: Duration) -> Result<u64, Error> {
        self.enter()?;
        self.inner.delete_expired(retention).await
    }
}
