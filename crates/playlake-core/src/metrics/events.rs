//! Internal events for playlake metrics emission.
//!
//! Each event struct represents a measurable occurrence in the ETL run.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! metric.
//!
//! ## Table Labels
//!
//! Metrics carry a `table` label naming the output table (`song`, `artist`,
//! `users`, `time`, `songplay`) or the source being read (`song_data`,
//! `log_data`).

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Source events
// ============================================================================

/// Event emitted when a source file has been fetched and decoded.
pub struct SourceFileRead {
    pub bytes: u64,
    pub records: u64,
    pub table: String,
}

impl InternalEvent for SourceFileRead {
    fn emit(self) {
        trace!(bytes = self.bytes, records = self.records, table = %self.table, "Source file read");
        counter!("playlake_source_files_read_total", "table" => self.table.clone()).increment(1);
        counter!("playlake_source_bytes_read_total", "table" => self.table.clone())
            .increment(self.bytes);
        counter!("playlake_source_records_read_total", "table" => self.table)
            .increment(self.records);
    }
}

// ============================================================================
// Transformation events
// ============================================================================

/// Why a row was left out of an output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Event was not a song play (`page != "NextSong"`).
    NotAPlay,
    /// `ts` was null or not numeric.
    MalformedTimestamp,
    /// No catalog song matched the event's title and duration.
    Unmatched,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NotAPlay => "not_a_play",
            DropReason::MalformedTimestamp => "malformed_timestamp",
            DropReason::Unmatched => "unmatched",
        }
    }
}

/// Event emitted when rows are dropped from a table.
pub struct RowsDropped {
    pub rows: u64,
    pub reason: DropReason,
    pub table: String,
}

impl InternalEvent for RowsDropped {
    fn emit(self) {
        trace!(rows = self.rows, reason = self.reason.as_str(), table = %self.table, "Rows dropped");
        counter!(
            "playlake_rows_dropped_total",
            "reason" => self.reason.as_str(),
            "table" => self.table
        )
        .increment(self.rows);
    }
}

/// Event emitted when play events match more than one catalog song.
pub struct AmbiguousJoinMatches {
    /// Events with more than one match.
    pub events: u64,
    /// Extra fact rows produced beyond one per event.
    pub extra_rows: u64,
}

impl InternalEvent for AmbiguousJoinMatches {
    fn emit(self) {
        trace!(events = self.events, extra_rows = self.extra_rows, "Ambiguous join matches");
        counter!("playlake_join_ambiguous_events_total").increment(self.events);
        counter!("playlake_join_fanout_rows_total").increment(self.extra_rows);
    }
}

// ============================================================================
// Sink events
// ============================================================================

/// Event emitted when a table has been fully written.
pub struct TableWritten {
    pub rows: u64,
    pub partitions: u64,
    pub duration: Duration,
    pub table: String,
}

impl InternalEvent for TableWritten {
    fn emit(self) {
        trace!(
            rows = self.rows,
            partitions = self.partitions,
            duration_ms = self.duration.as_millis(),
            table = %self.table,
            "Table written"
        );
        counter!("playlake_rows_written_total", "table" => self.table.clone())
            .increment(self.rows);
        counter!("playlake_partitions_written_total", "table" => self.table.clone())
            .increment(self.partitions);
        histogram!("playlake_table_write_duration_seconds", "table" => self.table)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a parquet file is written to storage.
pub struct ParquetFileWritten {
    pub bytes: usize,
    pub table: String,
}

impl InternalEvent for ParquetFileWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, table = %self.table, "Parquet file written");
        counter!("playlake_parquet_files_written_total", "table" => self.table.clone())
            .increment(1);
        counter!("playlake_parquet_bytes_written_total", "table" => self.table)
            .increment(self.bytes as u64);
    }
}

/// Event emitted when objects from a previous run are removed before a write.
pub struct ObjectsOverwritten {
    pub count: u64,
    pub table: String,
}

impl InternalEvent for ObjectsOverwritten {
    fn emit(self) {
        trace!(count = self.count, table = %self.table, "Objects overwritten");
        counter!("playlake_objects_overwritten_total", "table" => self.table).increment(self.count);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    List,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request"
        );
        counter!(
            "playlake_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "playlake_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Run events
// ============================================================================

/// Event emitted when a pipeline stage finishes.
pub struct StageCompleted {
    pub stage: &'static str,
    pub duration: Duration,
}

impl InternalEvent for StageCompleted {
    fn emit(self) {
        trace!(stage = self.stage, duration_ms = self.duration.as_millis(), "Stage completed");
        histogram!("playlake_stage_duration_seconds", "stage" => self.stage)
            .record(self.duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_labels() {
        assert_eq!(DropReason::NotAPlay.as_str(), "not_a_play");
        assert_eq!(DropReason::MalformedTimestamp.as_str(), "malformed_timestamp");
        assert_eq!(DropReason::Unmatched.as_str(), "unmatched");
    }

    #[test]
    fn test_request_status_from_result() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(RequestStatus::from_result(&ok).as_str(), "success");
        assert_eq!(RequestStatus::from_result(&err).as_str(), "error");
    }

    #[test]
    fn test_emit_without_recorder_is_noop() {
        crate::emit!(RowsDropped {
            rows: 3,
            reason: DropReason::Unmatched,
            table: "songplay".to_string(),
        });
        crate::emit!(StageCompleted {
            stage: "song_data",
            duration: Duration::from_millis(5),
        });
    }
}
