//! # sessionstore: durable, self-expiring session storage
//!
//! `sessionstore` keeps server-side sessions in a database table, one row per
//! session id, with the session data stored as an opaque, codec-encoded
//! payload next to its last write time. It is built to sit behind a web
//! framework's session layer and to shrug off dropped database connections.
//!
//! - **Upserts**: saving a session is a single insert-or-update statement,
//!   so concurrent writers of the same id never produce duplicates.
//! - **Sliding expiry**: reading a session last written on an earlier day
//!   refreshes its write date; [`SessionStore::clean`] removes sessions that
//!   went unwritten for longer than the retention window (7 days by default).
//! - **Retries**: every operation is retried up to 5 times on connection
//!   failures. Other errors are returned immediately.
//! - **Safe reads**: [`SessionStore::get`] never fails because of stored
//!   content; junk ids, missing sessions and undecodable payloads all come
//!   back as empty sessions.
//!
//! # Quick Start
//!
//! With the `postgres-store` feature:
//!
//! ```rust,ignore
//! use sessionstore::{SessionMap, SessionStore, StoreConfig};
//! use sessionstore::store::postgres::PostgresStoreBuilder;
//! use sqlx::postgres::PgConnectOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sessionstore::Error> {
//!     let config = StoreConfig::from_env()?;
//!     let options: PgConnectOptions = std::env::var("DATABASE_URL")
//!         .expect("DATABASE_URL must be set")
//!         .parse()?;
//!
//!     // Building does not connect; `initialize` creates the database and
//!     // table when they are missing.
//!     let store = PostgresStoreBuilder::from_config(options, &config).build()?;
//!     let sessions = SessionStore::from_config(store, &config);
//!     sessions.initialize().await?;
//!
//!     let mut session = sessions.get::<SessionMap>("cookie value").await?;
//!     session.data_mut().insert("count", &1u32)?;
//!     sessions.save(&session.id(), session.data()).await?;
//!
//!     // Sweep expired sessions every hour.
//!     sessions.spawn_cleanup(std::time::Duration::from_secs(3600));
//!     Ok(())
//! }
//! ```
//!
//! # Stores
//!
//! [`SessionStore`] works on top of any [`store::RecordStore`]:
//!
//! - [`store::postgres::PostgresStore`] (feature `postgres-store`): the
//!   production store. Uses a lazily connected `sqlx` pool; one pooled
//!   connection per operation.
//! - [`store::MemoryStore`]: in-process, for development and tests.
//!
//! ## Serialization
//! Payloads are encoded by a [`Codec`]. The [`DefaultCodec`] uses one of:
//!
//! - [`bincode`](https://crates.io/crates/bincode) (default) - Fast, compact binary serialization.
//! - [`rmp-serde`](https://crates.io/crates/rmp-serde) (MessagePack) - Cross-language compatible serialization.
//!
//! To use `MessagePack` instead of the default `bincode`, add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sessionstore = { version = "0.1", default-features = false, features = ["messagepack", "postgres-store"] }
//! ```
//!
//! Any other format can be plugged in with [`SessionStore::with_codec`].

#[cfg(feature = "postgres-store")]
pub use sqlx;

mod codec;
pub use codec::*;

mod config;
pub use config::*;

mod error;
pub use error::Error;

mod retry;
pub use retry::RetryPolicy;

mod session;
pub use session::*;

mod sessions;
pub use sessions::SessionStore;

pub mod store;
