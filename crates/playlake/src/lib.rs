//! Playlake: builds a star-schema music play dataset.
//!
//! This crate handles:
//! - Reading raw song catalog and event log JSON from S3 or local storage
//! - Projecting the song, artist and user dimensions
//! - Decomposing event timestamps into the time dimension
//! - Joining plays against the catalog into the song play fact table
//! - Writing every table as a Hive-partitioned Parquet dataset

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;
pub mod table;
pub mod time;

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use engine::{ArrowEngine, Engine};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{Pipeline, RunSummary, run_pipeline};
pub use schema::Table;

// Re-export from playlake-core
pub use playlake_core::{StoragePool, StoragePoolRef, init_tracing};
