//! Partitioned table writer.
//!
//! Persists a table as a Hive-style Parquet dataset:
//!
//! ```text
//! song/song.parquet/
//!   year=2018/artist_id=AR123/part-00000.snappy.parquet
//!   year=__HIVE_DEFAULT_PARTITION__/artist_id=AR456/part-00000.snappy.parquet
//!   _SUCCESS
//! ```
//!
//! Partition columns appear only in directory names. Every write replaces
//! whatever was stored at the destination before.

use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, AsArray, RecordBatch, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::DataType;
use futures::{StreamExt, TryStreamExt};
use indexmap::IndexMap;
use object_store::PutPayload;
use snafu::ResultExt;
use tracing::{debug, info};

use playlake_core::metrics::events::{ObjectsOverwritten, ParquetFileWritten, TableWritten};
use playlake_core::partition::partition_prefix;
use playlake_core::{ParquetCompression, StoragePool, emit};

use super::encode::{data_file_name, encode_batch};
use crate::error::{EncodeSnafu, PartitionSnafu, WriteError, WriteStorageSnafu};

/// Marker written after every data file of a table.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Outcome of writing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: String,
    pub url: String,
    pub rows: u64,
    pub files: u64,
    /// Distinct partition directories; zero for unpartitioned tables.
    pub partitions: u64,
    pub bytes: u64,
    /// Objects removed from the destination before writing.
    pub overwritten: u64,
}

/// Configuration for the partitioned writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub compression: ParquetCompression,
    /// Number of partition files uploaded concurrently.
    pub upload_concurrency: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::default(),
            upload_concurrency: 8,
        }
    }
}

/// One file to upload: relative key and the rows it holds.
struct PartitionFile {
    key: String,
    batch: RecordBatch,
}

/// Writes tables to any location the pool can open.
pub struct PartitionedWriter {
    pool: Arc<StoragePool>,
    config: WriterConfig,
}

impl PartitionedWriter {
    pub fn new(pool: Arc<StoragePool>, config: WriterConfig) -> Self {
        Self { pool, config }
    }

    /// Overwrite the dataset at `url` with `batch`, one directory layer per
    /// entry of `partition_by` in the given order.
    ///
    /// `table` labels logs and metrics.
    pub async fn write(
        &self,
        table: &str,
        batch: &RecordBatch,
        url: &str,
        partition_by: &[String],
    ) -> Result<WriteSummary, WriteError> {
        let start = Instant::now();
        let files = self.split(batch, url, partition_by)?;

        let provider = self
            .pool
            .get_or_create(url)
            .await
            .context(WriteStorageSnafu { location: url })?;

        let overwritten = provider
            .delete_prefix("")
            .await
            .context(WriteStorageSnafu { location: url })?;
        if overwritten > 0 {
            debug!(table, url, objects = overwritten, "Removed previous output");
            emit!(ObjectsOverwritten {
                count: overwritten,
                table: table.to_string(),
            });
        }

        let file_count = files.len() as u64;
        let compression = self.config.compression;
        let bytes: u64 = futures::stream::iter(files)
            .map(|file| {
                let provider = provider.clone();
                async move {
                    let location = format!("{url}/{}", file.key);
                    let encoded = encode_batch(&file.batch, compression).context(EncodeSnafu {
                        location: location.as_str(),
                    })?;
                    let size = encoded.len();
                    provider
                        .put_parquet(&file.key, PutPayload::from(encoded))
                        .await
                        .context(WriteStorageSnafu {
                            location: location.as_str(),
                        })?;

                    debug!(
                        table,
                        path = %location,
                        rows = file.batch.num_rows(),
                        bytes = size,
                        "Wrote data file"
                    );
                    emit!(ParquetFileWritten {
                        bytes: size,
                        table: table.to_string(),
                    });
                    Ok::<_, WriteError>(size as u64)
                }
            })
            .buffer_unordered(self.config.upload_concurrency.max(1))
            .try_fold(0u64, |total, size| async move { Ok(total + size) })
            .await?;

        provider
            .put_payload(SUCCESS_MARKER, PutPayload::default())
            .await
            .context(WriteStorageSnafu {
                location: format!("{url}/{SUCCESS_MARKER}"),
            })?;

        let partitions = if partition_by.is_empty() { 0 } else { file_count };
        let summary = WriteSummary {
            table: table.to_string(),
            url: url.to_string(),
            rows: batch.num_rows() as u64,
            files: file_count,
            partitions,
            bytes,
            overwritten,
        };

        emit!(TableWritten {
            rows: summary.rows,
            partitions,
            duration: start.elapsed(),
            table: table.to_string(),
        });
        info!(
            table,
            url,
            rows = summary.rows,
            files = summary.files,
            partitions,
            "Table written"
        );

        Ok(summary)
    }

    /// Group rows by partition value, dropping the partition columns.
    fn split(
        &self,
        batch: &RecordBatch,
        url: &str,
        partition_by: &[String],
    ) -> Result<Vec<PartitionFile>, WriteError> {
        let file_name = data_file_name(self.config.compression);
        if partition_by.is_empty() {
            return Ok(vec![PartitionFile {
                key: file_name,
                batch: batch.clone(),
            }]);
        }

        let schema = batch.schema();
        let mut key_columns = Vec::with_capacity(partition_by.len());
        for column in partition_by {
            let index = schema
                .index_of(column)
                .map_err(|_| WriteError::MissingPartitionColumn {
                    location: url.to_string(),
                    column: column.clone(),
                })?;
            let values = cast(batch.column(index), &DataType::Utf8)
                .context(PartitionSnafu { location: url })?;
            key_columns.push((index, values));
        }

        let mut groups: IndexMap<Vec<Option<String>>, Vec<u32>> = IndexMap::new();
        for row in 0..batch.num_rows() {
            let key = key_columns
                .iter()
                .map(|(_, values)| {
                    let values = values.as_string::<i32>();
                    // Empty strings share the null partition directory.
                    (values.is_valid(row) && !values.value(row).is_empty())
                        .then(|| values.value(row).to_string())
                })
                .collect();
            groups.entry(key).or_default().push(row as u32);
        }

        let data_indices: Vec<usize> = (0..schema.fields().len())
            .filter(|i| !key_columns.iter().any(|(index, _)| index == i))
            .collect();
        let data = batch
            .project(&data_indices)
            .context(PartitionSnafu { location: url })?;

        groups
            .into_iter()
            .map(|(values, rows)| {
                let prefix = partition_prefix(
                    &partition_by
                        .iter()
                        .zip(&values)
                        .map(|(column, value)| (column.as_str(), value.as_deref()))
                        .collect::<Vec<_>>(),
                );
                let batch = take_record_batch(&data, &UInt32Array::from(rows))
                    .context(PartitionSnafu { location: url })?;
                Ok(PartitionFile {
                    key: format!("{prefix}/{file_name}"),
                    batch,
                })
            })
            .collect()
    }
}
