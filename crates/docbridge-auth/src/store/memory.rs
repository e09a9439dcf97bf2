//! In-memory store on a sharded concurrent map.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Record, Store, StoreResult, Update, UpdateFn};

/// [`Store`] backed by a [`DashMap`].
///
/// Reads and writes on different keys only contend when they hash to the
/// same shard.
pub struct MemoryStore<T> {
    entries: DashMap<String, T>,
}

impl<T> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl<T: Record> Store<T> for MemoryStore<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<T>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &T) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &T) -> StoreResult<bool> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Ok(true)
            }
        }
    }

    async fn take(&self, key: &str) -> StoreResult<Option<T>> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    async fn update(&self, key: &str, apply: UpdateFn<'_, T>) -> StoreResult<Update<T>> {
        // The shard stays write-locked until the replacement is in place
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(Update::Missing);
        };
        Ok(match apply(entry.value()) {
            Some(next) => {
                *entry.value_mut() = next.clone();
                Update::Updated(next)
            }
            None => Update::Unchanged(entry.value().clone()),
        })
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut removed = 0;
        self.entries.retain(|_, value| {
            let live = value.expires_at().is_none_or(|expires_at| now < expires_at);
            if !live {
                removed += 1;
            }
            live
        });
        Ok(removed)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.len())
    }
}
