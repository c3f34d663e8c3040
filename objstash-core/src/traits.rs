//! Object Store Trait Definitions
//!
//! Defines the common interface for all object storage backends, together
//! with generic defaults for every operation that can be derived from the
//! required primitives.

use std::any::Any;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::chunk::{self, ChunkStream};
use crate::error::{ObjectStoreError, Result};

/// Metadata about a stored object.
///
/// Built fresh by every [`ObjectStore::head`] call; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Size in bytes
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(size: u64) -> Self {
        Self { size }
    }
}

/// Abstraction over key-addressed binary object storage.
///
/// Keys are opaque strings. Prefix operations use a plain string-prefix
/// test and know nothing about `/`-separated hierarchies.
///
/// A backend must supply `exists_under_prefix`, `get`, `put`,
/// `delete_single`, `delete_recursive` and `copy_recursive`, plus the
/// `as_any`/`as_object_store`/`store_type` plumbing. Everything else has a
/// default built from those and may be overridden where the backend has a
/// cheaper native operation.
///
/// Implementations must keep `exists(k)`, `head(k).is_some()` and
/// `get(k).is_some()` in agreement at all times.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Whether any object key starts with `prefix`.
    async fn exists_under_prefix(&self, prefix: &str) -> Result<bool>;

    /// Read a whole object. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write an object, fully replacing any previous value under `key`.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Delete one object. Deleting a missing key is a no-op.
    async fn delete_single(&self, key: &str) -> Result<()>;

    /// Delete every object whose key starts with `prefix`.
    async fn delete_recursive(&self, prefix: &str) -> Result<()>;

    /// Copy every object under `source_prefix` to `destination_prefix`
    /// followed by the remainder of its key, within this store.
    async fn copy_recursive(&self, source_prefix: &str, destination_prefix: &str) -> Result<()>;

    /// Concrete-type access, used to detect a same-backend copy source.
    fn as_any(&self) -> &dyn Any;

    /// This store as a trait object, so defaults can pass `self` where any
    /// backend is accepted.
    fn as_object_store(&self) -> &dyn ObjectStore;

    /// Get the name/type of this object store for logging.
    fn store_type(&self) -> &'static str;

    /// Check if an object exists at the given key.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    /// Like [`get`](ObjectStore::get), but a missing key is an error.
    async fn get_or_fail(&self, key: &str) -> Result<Bytes> {
        self.get(key)
            .await?
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    /// Read an object as a sequence of `chunk_size` chunks.
    ///
    /// The default buffers the whole object before handing out zero-copy
    /// slices of it. An empty object yields one empty chunk.
    async fn get_as_chunks(&self, key: &str, chunk_size: usize) -> Result<Option<ChunkStream>> {
        chunk::validate_chunk_size(chunk_size)?;
        match self.get(key).await? {
            Some(data) => Ok(Some(chunk::chunk_stream(data, chunk_size)?)),
            None => Ok(None),
        }
    }

    async fn get_as_chunks_or_fail(&self, key: &str, chunk_size: usize) -> Result<ChunkStream> {
        self.get_as_chunks(key, chunk_size)
            .await?
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    /// Get metadata for an object, or `Ok(None)` if it does not exist.
    ///
    /// The default downloads the object to measure it.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        Ok(self
            .get(key)
            .await?
            .map(|data| ObjectInfo::new(data.len() as u64)))
    }

    /// Write an object from a chunk sequence.
    ///
    /// The default drains the whole stream into memory first, then issues a
    /// single [`put`](ObjectStore::put).
    async fn put_chunks(&self, key: &str, chunks: ChunkStream) -> Result<()> {
        let data = chunk::concat_chunks(chunks).await?;
        self.put(key, data).await
    }

    /// Delete several objects one after another, in input order.
    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete_single(key).await?;
        }
        Ok(())
    }

    /// Copy one object from `source` (any backend, possibly `self`) into
    /// this store.
    ///
    /// The default reads the whole source object and writes it back. Only
    /// content is copied. Backends should override this to use a native copy
    /// when `source` is their own concrete type.
    async fn copy_single(
        &self,
        source: &dyn ObjectStore,
        source_key: &str,
        destination_key: &str,
    ) -> Result<()> {
        let data = source.get_or_fail(source_key).await?;
        debug!(
            source_store = source.store_type(),
            store = self.store_type(),
            source_key,
            destination_key,
            size = data.len(),
            "copying object through memory"
        );
        self.put(destination_key, data).await
    }

    /// Move an object within this store. Not atomic: the copy is visible
    /// before the source is removed. Moving a key onto itself leaves the
    /// object in place.
    async fn move_object(&self, source_key: &str, destination_key: &str) -> Result<()> {
        self.copy_single(self.as_object_store(), source_key, destination_key)
            .await?;
        if source_key != destination_key {
            self.delete_single(source_key).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for dyn ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("store_type", &self.store_type())
            .finish()
    }
}
