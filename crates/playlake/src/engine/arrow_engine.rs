//! In-process engine over Arrow record batches and object storage.

use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;

use playlake_core::{ParquetCompression, StoragePoolRef};

use super::Engine;
use crate::error::{SourceError, TableError, WriteError};
use crate::sink::{PartitionedWriter, WriteSummary, WriterConfig};
use crate::source::{JsonReader, JsonReaderConfig, read_parquet_table};
use crate::table::{self, Joined, Projection};

/// Runs every operation in this process, on whole tables held in memory.
pub struct ArrowEngine {
    pool: StoragePoolRef,
    reader: JsonReader,
    writer: PartitionedWriter,
}

impl std::fmt::Debug for ArrowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrowEngine").finish_non_exhaustive()
    }
}

impl ArrowEngine {
    /// Create an engine writing with `compression`.
    pub fn new(pool: StoragePoolRef, compression: ParquetCompression) -> Self {
        Self::with_config(
            pool,
            JsonReaderConfig::default(),
            WriterConfig {
                compression,
                ..Default::default()
            },
        )
    }

    pub fn with_config(
        pool: StoragePoolRef,
        reader_config: JsonReaderConfig,
        writer_config: WriterConfig,
    ) -> Self {
        Self {
            reader: JsonReader::new(Arc::clone(&pool), reader_config),
            writer: PartitionedWriter::new(Arc::clone(&pool), writer_config),
            pool,
        }
    }
}

#[async_trait]
impl Engine for ArrowEngine {
    async fn read_json(&self, pattern: &str) -> Result<RecordBatch, SourceError> {
        self.reader.read(pattern).await
    }

    async fn read_parquet(
        &self,
        url: &str,
        schema: SchemaRef,
        partition_by: &[String],
    ) -> Result<RecordBatch, SourceError> {
        read_parquet_table(&self.pool, url, schema, partition_by).await
    }

    fn filter_eq(
        &self,
        batch: &RecordBatch,
        column: &str,
        value: &str,
    ) -> Result<RecordBatch, TableError> {
        table::filter_eq(batch, column, value)
    }

    fn project(
        &self,
        batch: &RecordBatch,
        projection: &Projection,
    ) -> Result<RecordBatch, TableError> {
        table::project(batch, projection)
    }

    fn join(
        &self,
        left: &RecordBatch,
        right: &RecordBatch,
        left_on: &[&str],
        right_on: &[&str],
    ) -> Result<Joined, TableError> {
        table::inner_join(left, right, left_on, right_on)
    }

    async fn write_partitioned(
        &self,
        table: &str,
        batch: &RecordBatch,
        url: &str,
        partition_by: &[String],
    ) -> Result<WriteSummary, WriteError> {
        self.writer.write(table, batch, url, partition_by).await
    }
}
