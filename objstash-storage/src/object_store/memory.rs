//! In-Memory Object Store
//!
//! Implements the ObjectStore trait over a concurrent hash map.
//! Useful for development, testing, and small embedded deployments.

use crate::metrics::{record_op, record_read, record_write};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use objstash_core::{rebase_key, ObjectInfo, ObjectStore, ObjectStoreError, Result};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, instrument};

const STORE_TYPE: &str = "memory";

/// Memory-backed object store.
///
/// Single-key reads, writes and removals are atomic per key. Prefix
/// operations scan every key and give no cross-key atomicity. Cloning the
/// store yields a handle onto the same objects.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects.iter().map(|e| e.value().len() as u64).sum()
    }

    /// Sorted snapshot of every key starting with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists_under_prefix(&self, prefix: &str) -> Result<bool> {
        record_op(STORE_TYPE, "exists_under_prefix");
        Ok(self.objects.iter().any(|e| e.key().starts_with(prefix)))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        record_op(STORE_TYPE, "get");
        let data = self.objects.get(key).map(|e| e.value().clone());
        if let Some(data) = &data {
            record_read(STORE_TYPE, data.len());
        }
        Ok(data)
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        record_op(STORE_TYPE, "put");
        record_write(STORE_TYPE, data.len());
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_single(&self, key: &str) -> Result<()> {
        record_op(STORE_TYPE, "delete_single");
        self.objects.remove(key);
        Ok(())
    }

    #[instrument(skip(self), fields(store = STORE_TYPE))]
    async fn delete_recursive(&self, prefix: &str) -> Result<()> {
        record_op(STORE_TYPE, "delete_recursive");
        let before = self.objects.len();
        self.objects.retain(|k, _| !k.starts_with(prefix));
        debug!(removed = before.saturating_sub(self.objects.len()), "deleted prefix");
        Ok(())
    }

    #[instrument(skip(self), fields(store = STORE_TYPE))]
    async fn copy_recursive(&self, source_prefix: &str, destination_prefix: &str) -> Result<()> {
        record_op(STORE_TYPE, "copy_recursive");
        // Collect first: inserting while a DashMap iterator holds a shard
        // lock would deadlock.
        let keys = self.keys_with_prefix(source_prefix);
        let mut copied = 0usize;
        for key in &keys {
            let Some(destination) = rebase_key(key, source_prefix, destination_prefix) else {
                continue;
            };
            let current = self.objects.get(key).map(|e| e.value().clone());
            if let Some(data) = current {
                record_write(STORE_TYPE, data.len());
                self.objects.insert(destination, data);
                copied += 1;
            }
        }
        debug!(matched = keys.len(), copied, "copied prefix");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_object_store(&self) -> &dyn ObjectStore {
        self
    }

    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        record_op(STORE_TYPE, "exists");
        Ok(self.objects.contains_key(key))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        record_op(STORE_TYPE, "head");
        Ok(self
            .objects
            .get(key)
            .map(|e| ObjectInfo::new(e.value().len() as u64)))
    }

    async fn copy_single(
        &self,
        source: &dyn ObjectStore,
        source_key: &str,
        destination_key: &str,
    ) -> Result<()> {
        let Some(source_store) = source.as_any().downcast_ref::<MemoryObjectStore>() else {
            return copy_through_memory(self, source, source_key, destination_key).await;
        };
        record_op(STORE_TYPE, "copy_single");
        let data = source_store
            .objects
            .get(source_key)
            .map(|e| e.value().clone())
            .ok_or_else(|| ObjectStoreError::NotFound(source_key.to_string()))?;
        record_write(STORE_TYPE, data.len());
        self.objects.insert(destination_key.to_string(), data);
        Ok(())
    }

    async fn move_object(&self, source_key: &str, destination_key: &str) -> Result<()> {
        record_op(STORE_TYPE, "move_object");
        let data = self
            .objects
            .get(source_key)
            .map(|e| e.value().clone())
            .ok_or_else(|| ObjectStoreError::NotFound(source_key.to_string()))?;
        if source_key == destination_key {
            return Ok(());
        }
        record_write(STORE_TYPE, data.len());
        self.objects.insert(destination_key.to_string(), data);
        self.objects.remove(source_key);
        Ok(())
    }
}

/// Generic read-then-write copy for a source of a different backend type.
async fn copy_through_memory(
    destination: &MemoryObjectStore,
    source: &dyn ObjectStore,
    source_key: &str,
    destination_key: &str,
) -> Result<()> {
    let data = source.get_or_fail(source_key).await?;
    destination.put(destination_key, data).await
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
