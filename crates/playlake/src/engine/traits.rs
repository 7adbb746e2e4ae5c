//! The table engine abstraction.
//!
//! The pipeline only talks to an [`Engine`]: read a record set, filter,
//! project, join and write. The in-process Arrow implementation is
//! [`super::ArrowEngine`]; a distributed engine could stand in its place.

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;

use crate::error::{SourceError, TableError, WriteError};
use crate::sink::WriteSummary;
use crate::table::{Joined, Projection};

/// Operations a table engine provides to the pipeline.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Read every JSON record matched by a path glob.
    async fn read_json(&self, pattern: &str) -> Result<RecordBatch, SourceError>;

    /// Read a partitioned Parquet table back, conformed to `schema`.
    async fn read_parquet(
        &self,
        url: &str,
        schema: SchemaRef,
        partition_by: &[String],
    ) -> Result<RecordBatch, SourceError>;

    /// Keep rows whose `column` equals `value`.
    fn filter_eq(
        &self,
        batch: &RecordBatch,
        column: &str,
        value: &str,
    ) -> Result<RecordBatch, TableError>;

    /// Select, rename and cast columns.
    fn project(
        &self,
        batch: &RecordBatch,
        projection: &Projection,
    ) -> Result<RecordBatch, TableError>;

    /// Inner equi-join on pairwise key columns.
    fn join(
        &self,
        left: &RecordBatch,
        right: &RecordBatch,
        left_on: &[&str],
        right_on: &[&str],
    ) -> Result<Joined, TableError>;

    /// Overwrite the dataset at `url` with `batch`.
    async fn write_partitioned(
        &self,
        table: &str,
        batch: &RecordBatch,
        url: &str,
        partition_by: &[String],
    ) -> Result<WriteSummary, WriteError>;
}
