//! Persistent store on an embedded sled database.
//!
//! Each record type lives in its own tree named after [`Record::COLLECTION`];
//! values are JSON.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Record, Store, StoreError, StoreResult, Update, UpdateFn};

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// [`Store`] backed by one sled tree.
pub struct SledStore<T> {
    tree: sled::Tree,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SledStore<T> {
    /// Open (or create) the tree for `T` in `db`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if sled cannot open the tree.
    pub fn open(db: &sled::Db) -> StoreResult<Self> {
        Ok(Self {
            tree: db.open_tree(T::COLLECTION)?,
            _record: PhantomData,
        })
    }

    fn encode(value: &T) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(bytes: &[u8]) -> StoreResult<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<T> fmt::Debug for SledStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore")
            .field("tree", &String::from_utf8_lossy(&self.tree.name()))
            .finish()
    }
}

#[async_trait]
impl<T: Record> Store<T> for SledStore<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<T>> {
        self.tree
            .get(key)?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    async fn put(&self, key: &str, value: &T) -> StoreResult<()> {
        self.tree.insert(key, Self::encode(value)?)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &T) -> StoreResult<bool> {
        let swapped = self
            .tree
            .compare_and_swap(key, None::<&[u8]>, Some(Self::encode(value)?))?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.tree.flush_async().await?;
        Ok(true)
    }

    async fn take(&self, key: &str) -> StoreResult<Option<T>> {
        let Some(bytes) = self.tree.remove(key)? else {
            return Ok(None);
        };
        self.tree.flush_async().await?;
        Self::decode(&bytes).map(Some)
    }

    async fn update(&self, key: &str, apply: UpdateFn<'_, T>) -> StoreResult<Update<T>> {
        loop {
            let Some(current) = self.tree.get(key)? else {
                return Ok(Update::Missing);
            };
            let record = Self::decode(&current)?;
            let Some(next) = apply(&record) else {
                return Ok(Update::Unchanged(record));
            };
            // Retry if another writer replaced the value since we read it
            let swapped = self
                .tree
                .compare_and_swap(key, Some(&current), Some(Self::encode(&next)?))?;
            if swapped.is_ok() {
                self.tree.flush_async().await?;
                return Ok(Update::Updated(next));
            }
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let removed = self.tree.remove(key)?.is_some();
        if removed {
            self.tree.flush_async().await?;
        }
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in self.tree.iter() {
            let (key, bytes) = entry?;
            let expired = match Self::decode(&bytes) {
                Ok(record) => record.expires_at().is_some_and(|expires_at| now >= expires_at),
                Err(err) => {
                    tracing::warn!(
                        collection = T::COLLECTION,
                        error = %err,
                        "skipping undecodable record during purge"
                    );
                    false
                }
            };
            // Only delete the exact value we inspected; a concurrent writer wins.
            if expired
                && self
                    .tree
                    .compare_and_swap(&key, Some(&bytes), None::<&[u8]>)?
                    .is_ok()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            self.tree.flush_async().await?;
        }
        Ok(removed)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.tree.len())
    }
}
