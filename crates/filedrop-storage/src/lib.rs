//! filedrop storage library
//!
//! This crate provides the storage abstraction used by the upload pipeline and two
//! implementations: the local filesystem and an in-process memory store.
//!
//! # Addresses
//!
//! Every stored object is addressed by a [`StoragePath`]: a backend scheme plus a
//! relative key, rendered as `scheme://dir/name.ext`. Keys must be relative and must
//! not contain `..` segments. Key handling is centralized in the `keys` module so all
//! backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filedrop_core::StorageBackend;
pub use keys::StoragePath;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use traits::{Metadata, Storage, StorageError, StorageReader, StorageResult, StorageWriter};
