//! Error types for the playlake ETL.

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::prelude::*;
use std::fmt;

// Re-export common errors
pub use playlake_core::error::{ConfigError, StorageError};

/// Failure classes a run can end in.
///
/// Every error below maps onto exactly one kind. `JoinAmbiguity` and
/// row-level `MalformedTimestamp` are reported as warnings and never abort
/// a run; they appear here so that log lines can be tagged consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, detected before any data is touched.
    Configuration,
    /// No input matched, or the storage backend could not be reached.
    SourceUnavailable,
    /// Records or columns could not be reconciled to a single type.
    SchemaConflict,
    /// An event timestamp could not be decoded.
    MalformedTimestamp,
    /// A play event matched more than one catalog song.
    JoinAmbiguity,
    /// A table could not be encoded or persisted.
    WriteFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::SchemaConflict => "schema_conflict",
            ErrorKind::MalformedTimestamp => "malformed_timestamp",
            ErrorKind::JoinAmbiguity => "join_ambiguity",
            ErrorKind::WriteFailure => "write_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while loading a source record set.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The path pattern is not a usable glob.
    #[snafu(display("Invalid path pattern '{pattern}': {message}"))]
    InvalidPattern { pattern: String, message: String },

    /// Nothing matched the pattern.
    #[snafu(display("No files match '{pattern}'"))]
    NoMatchingFiles { pattern: String },

    /// Listing or fetching from storage failed.
    #[snafu(display("Failed to read from '{location}': {source}"))]
    SourceStorage {
        location: String,
        source: StorageError,
    },

    /// A file is not valid JSON.
    #[snafu(display("Malformed JSON in {path}: {source}"))]
    MalformedJson {
        path: String,
        source: serde_json::Error,
    },

    /// Records disagree on a field's type in a way that cannot be widened.
    #[snafu(display("Cannot infer a common schema for '{pattern}': {source}"))]
    SchemaInference { pattern: String, source: ArrowError },

    /// Records could not be decoded against the inferred schema.
    #[snafu(display("Failed to decode records from '{pattern}': {source}"))]
    Decode { pattern: String, source: ArrowError },

    /// A Parquet file could not be read.
    #[snafu(display("Failed to read Parquet file {path}: {source}"))]
    ParquetRead { path: String, source: ParquetError },

    /// A stored column or partition value does not fit the expected type.
    #[snafu(display("Column '{column}' in {path} does not match the table schema: {source}"))]
    ColumnMismatch {
        path: String,
        column: String,
        source: ArrowError,
    },
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::InvalidPattern { .. }
            | SourceError::NoMatchingFiles { .. }
            | SourceError::SourceStorage { .. }
            | SourceError::ParquetRead { .. } => ErrorKind::SourceUnavailable,
            SourceError::MalformedJson { .. }
            | SourceError::SchemaInference { .. }
            | SourceError::Decode { .. }
            | SourceError::ColumnMismatch { .. } => ErrorKind::SchemaConflict,
        }
    }
}

/// Errors from in-memory table operations (filter, projection, join).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TableError {
    /// A required column is absent.
    #[snafu(display("Column '{column}' not found"))]
    MissingColumn { column: String },

    /// A column could not be converted to the requested type.
    #[snafu(display("Cannot convert column '{column}': {source}"))]
    Cast { column: String, source: ArrowError },

    /// Both sides of a join carry a column with the same name.
    #[snafu(display("Column '{column}' exists on both sides of the join"))]
    DuplicateColumn { column: String },

    /// Join key lists differ in length.
    #[snafu(display("Join has {left} left key(s) but {right} right key(s)"))]
    KeyCount { left: usize, right: usize },

    /// Any other Arrow kernel failure.
    #[snafu(display("Arrow error: {source}"))]
    Arrow { source: ArrowError },
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SchemaConflict
    }
}

/// Errors decoding an epoch-millisecond timestamp.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum TimeError {
    /// The timestamp is null.
    #[snafu(display("Timestamp is null"))]
    NullTimestamp,

    /// The timestamp is outside the representable calendar range.
    #[snafu(display("Timestamp {ts} is out of range"))]
    OutOfRange { ts: i64 },

    /// The timestamp column cannot hold numbers at all.
    #[snafu(display("Timestamp column '{column}' has non-numeric type {data_type}"))]
    UnsupportedType { column: String, data_type: String },

    /// Decoded fields do not fit the time table schema.
    #[snafu(display("Cannot build time table: {message}"))]
    Assemble { message: String },
}

impl TimeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedTimestamp
    }
}

/// Errors that can occur while writing a table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// Storage rejected a delete or put.
    #[snafu(display("Failed to write '{location}': {source}"))]
    WriteStorage {
        location: String,
        source: StorageError,
    },

    /// Parquet encoding failed.
    #[snafu(display("Failed to encode Parquet for '{location}': {source}"))]
    Encode {
        location: String,
        source: ParquetError,
    },

    /// A partition column is not present in the table.
    #[snafu(display("Partition column '{column}' not found in table written to '{location}'"))]
    MissingPartitionColumn { location: String, column: String },

    /// Splitting the table into partitions failed.
    #[snafu(display("Failed to partition '{location}': {source}"))]
    Partition {
        location: String,
        source: ArrowError,
    },
}

impl WriteError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::WriteFailure
    }
}

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Reading a source failed.
    #[snafu(display("Reading {table} failed: {source}"))]
    Source { table: String, source: SourceError },

    /// A transformation failed.
    #[snafu(display("Building {table} failed: {source}"))]
    Table { table: String, source: TableError },

    /// Timestamp decomposition failed for a whole column.
    #[snafu(display("Decoding timestamps for {table} failed: {source}"))]
    Time { table: String, source: TimeError },

    /// Writing a table failed.
    #[snafu(display("Writing {table} failed: {source}"))]
    Write { table: String, source: WriteError },
}

impl PipelineError {
    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config { .. } => ErrorKind::Configuration,
            PipelineError::Source { source, .. } => source.kind(),
            PipelineError::Table { source, .. } => source.kind(),
            PipelineError::Time { source, .. } => source.kind(),
            PipelineError::Write { source, .. } => source.kind(),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}
