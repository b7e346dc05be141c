//! # Tessera Core - Foundation
//!
//! **Purpose**: Types shared by every Tessera crate.
//!
//! - `TesseraError`: the single error type (configuration, validation, storage)
//! - `Effect`, `Rule`, `Record`, `PolicySnapshot`: the tuples the engine stores
//! - `Adapter`: the storage boundary the enforcer loads from and writes through
//! - `EnforcerConfig`: TOML configuration with environment overrides
//!
//! This crate holds no evaluation logic; model parsing lives in
//! `tessera-model` and enforcement in `tessera-rbac`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Storage boundary
pub mod adapter;

/// Enforcer configuration
pub mod config;

/// Unified error type
pub mod errors;

/// Policy tuples
pub mod types;

pub use adapter::Adapter;
pub use config::{EnforcerConfig, ModelSource, StorageBackend, StorageConfig};
pub use errors::{Result, TesseraError};
pub use types::{Effect, PolicySnapshot, Record, Rule, GLOBAL_DOMAIN};
