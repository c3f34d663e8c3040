//! Object Store Contract
//!
//! Backend-agnostic abstraction over key-addressed binary object storage.
//! Concrete backends live in `objstash-storage`; this crate holds the
//! [`ObjectStore`] trait, its generic defaults and the shared value types.

pub mod chunk;
mod error;
mod key;
mod traits;

// Re-exports
pub use chunk::{chunk_bytes, concat_chunks, rechunk, stream_from_chunks, ChunkStream};
pub use error::{ObjectStoreError, Result};
pub use key::rebase_key;
pub use traits::{ObjectInfo, ObjectStore};
