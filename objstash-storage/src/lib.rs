//! Key-addressed object storage backends.
//!
//! Callers program against [`ObjectStore`] and pick a backend at
//! construction time:
//!
//! - [`MemoryObjectStore`] keeps every object in a concurrent in-process map.
//! - [`S3ObjectStore`] (feature `s3`, on by default) talks to an S3 bucket
//!   and uses server-side copy when both ends of a copy are S3 stores.
//!
//! ```
//! use bytes::Bytes;
//! use objstash_storage::{MemoryObjectStore, ObjectStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> objstash_storage::Result<()> {
//! let store = MemoryObjectStore::new();
//! store.put("reports/2024.csv", Bytes::from_static(b"a,b\n1,2\n")).await?;
//! store.copy_recursive("reports/", "archive/reports/").await?;
//! assert!(store.exists("archive/reports/2024.csv").await?);
//! # Ok(())
//! # }
//! ```

mod metrics;
pub mod object_store;

pub use object_store::MemoryObjectStore;

#[cfg(feature = "s3")]
pub use object_store::{S3Config, S3ObjectStore};

pub use objstash_core::{
    chunk_bytes, concat_chunks, rebase_key, rechunk, stream_from_chunks, ChunkStream, ObjectInfo,
    ObjectStore, ObjectStoreError, Result,
};
