//! playlake-core: Shared plumbing for the playlake ETL.
//!
//! This crate holds everything that is not specific to the music data model:
//!
//! - `storage/` - Object storage abstraction (S3, local filesystem)
//! - `resource` - Storage connection pooling
//! - `partition` - Hive-style partition directory names
//! - `metrics/` - Internal events emitted through the `metrics` facade
//! - `config/` - YAML loading, environment variable interpolation, output path checks
//! - `error` - Common error types
//! - `tracing` - Log subscriber setup

pub mod config;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod resource;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{OutputDir, ParquetCompression};
pub use error::{ConfigError, StorageError};
pub use partition::PartitionExtractor;
pub use resource::{StoragePool, StoragePoolRef};
pub use storage::{StorageProvider, StorageProviderRef};
pub use crate::tracing::init_tracing;
