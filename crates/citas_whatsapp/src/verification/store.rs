use chrono::{DateTime, Utc};
use citas_common::services::BoxFuture;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use super::VerificationEntry;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Keyed storage for verification entries.
///
/// The in-memory store is process-local and lost on restart; an external
/// TTL-capable store can implement this trait instead.
pub trait VerificationStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<VerificationEntry>, StoreError>;

    /// Inserts or replaces the entry for `key`.
    fn put<'a>(&'a self, key: &'a str, entry: VerificationEntry) -> BoxFuture<'a, (), StoreError>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, (), StoreError>;

    fn count(&self) -> BoxFuture<'_, usize, StoreError>;

    /// Removes every entry expired at `now`, returning how many went.
    fn purge_expired(&self, now: DateTime<Utc>) -> BoxFuture<'_, usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryVerificationStore {
    entries: RwLock<HashMap<String, VerificationEntry>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VerificationStore for InMemoryVerificationStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<VerificationEntry>, StoreError> {
        Box::pin(async move { Ok(self.entries.read().await.get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, entry: VerificationEntry) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_string(), entry);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, usize, StoreError> {
        Box::pin(async move { Ok(self.entries.read().await.len()) })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> BoxFuture<'_, usize, StoreError> {
        Box::pin(async move {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            Ok(before - entries.len())
        })
    }
}
