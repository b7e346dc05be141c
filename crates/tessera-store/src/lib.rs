//! # Tessera Store - Storage Adapters
//!
//! **Purpose**: Concrete [`Adapter`] implementations for the enforcer.
//!
//! - `MemoryAdapter`: process memory, with injectable write failures
//! - `FileAdapter`: CSV policy lines (`p, role:ADMIN, d1, m1, delete, allow`)
//! - `JsonFileAdapter`: one JSON snapshot document
//!
//! [`adapter_from_config`] picks one from a [`StorageConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// CSV policy file
pub mod file;

/// JSON snapshot file
pub mod json;

/// Process memory
pub mod memory;

pub use file::FileAdapter;
pub use json::JsonFileAdapter;
pub use memory::MemoryAdapter;

use tessera_core::{Adapter, Result, StorageBackend, StorageConfig, TesseraError};

/// Build the adapter a storage configuration names
pub fn adapter_from_config(config: &StorageConfig) -> Result<Box<dyn Adapter>> {
    let require_path = || {
        config.path.clone().ok_or_else(|| {
            TesseraError::configuration(format!(
                "storage backend `{:?}` needs a path",
                config.backend
            ))
        })
    };
    let adapter: Box<dyn Adapter> = match config.backend {
        StorageBackend::Memory => Box::new(MemoryAdapter::new()),
        StorageBackend::File => Box::new(FileAdapter::new(require_path()?)),
        StorageBackend::Json => Box::new(JsonFileAdapter::new(require_path()?)),
    };
    tracing::debug!(backend = ?config.backend, path = ?config.path, "Opened storage adapter");
    Ok(adapter)
}
