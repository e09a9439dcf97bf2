//! Record stores.
//!
//! Every piece of authorization state lives behind the [`Store`] trait so the
//! engine never touches a global map. Two backends ship:
//!
//! - [`MemoryStore`] - sharded concurrent map (`dashmap`), lock-free reads
//! - [`SledStore`] - embedded `sled` database, one tree per record type
//!
//! The trait's atomic operations carry the protocol's safety properties:
//! `take` is a compare-and-delete (single-use codes and refresh tokens),
//! `insert_if_absent` never overwrites (unique identifiers) and `update`
//! rewrites a record in place without ever leaving its key vacant.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IssuedToken, PendingAuthorization, RefreshGrant, RegisteredClient};

mod memory;
#[cfg(feature = "sled")]
mod persistent;

pub use memory::MemoryStore;
#[cfg(feature = "sled")]
pub use persistent::SledStore;

/// Store failures
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Freshly generated identifiers kept colliding with existing keys
    #[error("could not allocate a unique key in {0}")]
    KeyExhausted(&'static str),

    /// The configured backend is not compiled in or is misconfigured
    #[error("storage configuration error: {0}")]
    Config(String),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A value that can be kept in a [`Store`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static {
    /// Collection (sled tree) name for this record type
    const COLLECTION: &'static str;

    /// Instant after which the record is dead, if it ever expires
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl Record for RegisteredClient {
    const COLLECTION: &'static str = "clients";
}

impl Record for PendingAuthorization {
    const COLLECTION: &'static str = "pending_authorizations";

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

impl Record for IssuedToken {
    const COLLECTION: &'static str = "access_tokens";

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

impl Record for RefreshGrant {
    const COLLECTION: &'static str = "refresh_grants";

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

/// Outcome of [`Store::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum Update<T> {
    /// No record under the key
    Missing,
    /// The update declined; holds the current record
    Unchanged(T),
    /// The record was replaced; holds the new value
    Updated(T),
}

/// Decides the replacement for an existing record, or `None` to keep it.
pub type UpdateFn<'a, T> = &'a (dyn Fn(&T) -> Option<T> + Send + Sync);

/// Keyed record storage.
///
/// All implementations must be safe for concurrent use; every method is a
/// single atomic operation on one key except `purge_expired`.
#[async_trait]
pub trait Store<T: Record>: Send + Sync + fmt::Debug {
    /// Look up a record.
    async fn get(&self, key: &str) -> StoreResult<Option<T>>;

    /// Insert or replace a record.
    async fn put(&self, key: &str, value: &T) -> StoreResult<()>;

    /// Insert only if `key` is vacant. Returns `false` if it was occupied.
    async fn insert_if_absent(&self, key: &str, value: &T) -> StoreResult<bool>;

    /// Atomically remove and return a record. Of any number of concurrent
    /// callers for the same key, at most one receives `Some`.
    async fn take(&self, key: &str) -> StoreResult<Option<T>>;

    /// Atomically replace an existing record with `apply(current)`.
    ///
    /// The key is never vacant while the update runs, so concurrent `take`
    /// callers see either the old or the new record. `apply` may run more
    /// than once under contention.
    async fn update(&self, key: &str, apply: UpdateFn<'_, T>) -> StoreResult<Update<T>>;

    /// Remove a record. Returns whether one was present.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Remove every record whose expiry is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Number of records held.
    async fn len(&self) -> StoreResult<usize>;
}

/// Shared handle to a store
pub type SharedStore<T> = Arc<dyn Store<T>>;

/// Which backend holds authorization state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; state is lost on restart
    #[default]
    Memory,
    /// Embedded sled database at `path`
    Sled,
}

/// Storage configuration (`[storage]` section)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackend,
    /// Database directory for the sled backend
    pub path: Option<PathBuf>,
    /// Seconds between expiry sweeps; 0 disables the sweeper
    pub sweep_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            sweep_interval: 60,
        }
    }
}

/// The four stores the engine works with.
#[derive(Debug, Clone)]
pub struct Stores {
    pub clients: SharedStore<RegisteredClient>,
    pub pending: SharedStore<PendingAuthorization>,
    pub access_tokens: SharedStore<IssuedToken>,
    pub refresh_grants: SharedStore<RefreshGrant>,
}

impl Stores {
    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            clients: Arc::new(MemoryStore::new()),
            pending: Arc::new(MemoryStore::new()),
            access_tokens: Arc::new(MemoryStore::new()),
            refresh_grants: Arc::new(MemoryStore::new()),
        }
    }

    /// Stores backed by a sled database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the database cannot be opened.
    #[cfg(feature = "sled")]
    pub fn open_sled(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "opened sled authorization store");
        Ok(Self {
            clients: Arc::new(SledStore::open(&db)?),
            pending: Arc::new(SledStore::open(&db)?),
            access_tokens: Arc::new(SledStore::open(&db)?),
            refresh_grants: Arc::new(SledStore::open(&db)?),
        })
    }

    /// Open the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the sled backend is selected without a
    /// path or without the `sled` feature, and [`StoreError::Backend`] if the
    /// database cannot be opened.
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            #[cfg(feature = "sled")]
            StorageBackend::Sled => {
                let path = config.path.as_ref().ok_or_else(|| {
                    StoreError::Config("storage.path is required for the sled backend".into())
                })?;
                Self::open_sled(path)
            }
            #[cfg(not(feature = "sled"))]
            StorageBackend::Sled => Err(StoreError::Config(
                "sled backend requested but the `sled` feature is disabled".into(),
            )),
        }
    }

    /// Purge expired pending authorizations, access tokens and refresh grants.
    ///
    /// # Errors
    ///
    /// Returns the first store error encountered.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let pending = self.pending.purge_expired(now).await?;
        let access = self.access_tokens.purge_expired(now).await?;
        let refresh = self.refresh_grants.purge_expired(now).await?;
        Ok(pending + access + refresh)
    }
}
