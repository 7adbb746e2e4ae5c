//! Common error types shared by the playlake crates.
//!
//! This module defines error types for storage and configuration that are
//! used both by the core plumbing and by the ETL stages.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// A path could not be represented as an object store path.
    #[snafu(display("Invalid object path '{path}': {source}"))]
    InvalidPath {
        path: String,
        source: object_store::path::Error,
    },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Input root is empty.
    #[snafu(display("input_root cannot be empty"))]
    EmptyInputRoot,

    /// Output root is empty.
    #[snafu(display("output_root cannot be empty"))]
    EmptyOutputRoot,

    /// Output path for a table is empty.
    #[snafu(display("Table '{table}' has an empty output path"))]
    EmptyTablePath { table: String },

    /// The reference UTC offset could not be parsed.
    #[snafu(display("Invalid UTC offset '{value}': expected a value like +00:00 or -05:30"))]
    InvalidUtcOffset { value: String },

    /// A partition column is not part of the table's schema.
    #[snafu(display("Table '{table}' cannot be partitioned by unknown column '{column}'"))]
    UnknownPartitionColumn { table: String, column: String },

    /// A partition column was listed more than once.
    #[snafu(display("Table '{table}' lists partition column '{column}' more than once"))]
    DuplicatePartitionColumn { table: String, column: String },

    /// Every column of the table would end up in the directory names.
    #[snafu(display("Table '{table}' cannot be partitioned by all of its columns"))]
    PartitionByAllColumns { table: String },

    /// Two tables would write into the same or nested directories.
    #[snafu(display("Tables '{first}' and '{second}' have overlapping output paths"))]
    OverlappingOutputs { first: String, second: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },
}
