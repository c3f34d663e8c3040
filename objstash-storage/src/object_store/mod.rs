//! Object Storage Module
//!
//! This module provides the concrete backends for the object store
//! contract: an in-process memory store and AWS S3.

mod memory;

#[cfg(feature = "s3")]
mod config;

#[cfg(feature = "s3")]
mod s3;

// Re-exports
pub use memory::MemoryObjectStore;

#[cfg(feature = "s3")]
pub use config::S3Config;

#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
