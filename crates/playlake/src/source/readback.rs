//! Reads a partitioned Parquet table back from storage.
//!
//! Partition columns live only in the `column=value` directory names, so
//! they are rebuilt from each file's path and cast to the type the caller
//! asks for. Stored columns are conformed to the same schema.

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, StringArray, new_null_array};
use arrow::compute::{CastOptions, cast_with_options, concat_batches};
use arrow::datatypes::{DataType, SchemaRef};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::ResultExt;
use tracing::{debug, info};

use playlake_core::{PartitionExtractor, StoragePool};

use crate::error::{
    ColumnMismatchSnafu, DecodeSnafu, NoMatchingFilesSnafu, ParquetReadSnafu, SourceError,
    SourceStorageSnafu,
};

/// Whether a listed key is a data file of the table.
fn is_data_file(key: &str) -> bool {
    key.ends_with(".parquet")
        && !key
            .split('/')
            .any(|segment| segment.starts_with('_') || segment.starts_with('.'))
}

/// Read the table stored at `url`, conforming it to `schema`.
///
/// A location with no objects at all is [`SourceError::NoMatchingFiles`]; a
/// table written with zero rows (only a marker file) reads as an empty batch.
pub async fn read_parquet_table(
    pool: &StoragePool,
    url: &str,
    schema: SchemaRef,
    partition_by: &[String],
) -> Result<RecordBatch, SourceError> {
    let provider = pool
        .get_or_create(url)
        .await
        .context(SourceStorageSnafu { location: url })?;

    let keys = provider
        .list()
        .await
        .context(SourceStorageSnafu { location: url })?;
    if keys.is_empty() {
        return NoMatchingFilesSnafu { pattern: url }.fail();
    }

    let extractor = PartitionExtractor::new(partition_by.to_vec());
    let mut batches = Vec::new();

    for key in keys.iter().filter(|key| is_data_file(key)) {
        let location = format!("{}/{}", provider.url(), key);
        let bytes = provider
            .get(key)
            .await
            .context(SourceStorageSnafu {
                location: location.as_str(),
            })?;

        let file_batches = read_file(bytes, &location)?;
        let partition_values = extractor.extract(key);
        debug!(path = %location, batches = file_batches.len(), "Read Parquet file");

        for batch in file_batches {
            batches.push(conform(
                &batch,
                &schema,
                partition_by,
                &partition_values,
                &location,
            )?);
        }
    }

    let table = concat_batches(&schema, &batches).context(DecodeSnafu { pattern: url })?;
    info!(url, rows = table.num_rows(), "Read table back");
    Ok(table)
}

fn read_file(bytes: Bytes, location: &str) -> Result<Vec<RecordBatch>, SourceError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .context(ParquetReadSnafu { path: location })?
        .build()
        .context(ParquetReadSnafu { path: location })?;

    reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SourceError::ParquetRead {
            path: location.to_string(),
            source: e.into(),
        })
}

/// Reorder, cast and complete `batch` so it matches `schema`.
fn conform(
    batch: &RecordBatch,
    schema: &SchemaRef,
    partition_by: &[String],
    partition_values: &std::collections::HashMap<String, Option<String>>,
    location: &str,
) -> Result<RecordBatch, SourceError> {
    let rows = batch.num_rows();
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            let column: ArrayRef = if partition_by.iter().any(|c| c == name) {
                match partition_values.get(name).cloned().flatten() {
                    Some(value) => {
                        let values: ArrayRef =
                            Arc::new(StringArray::from(vec![value.as_str(); rows]));
                        cast_with_options(&values, field.data_type(), &strict).context(
                            ColumnMismatchSnafu {
                                path: location,
                                column: name.as_str(),
                            },
                        )?
                    }
                    None => new_null_array(field.data_type(), rows),
                }
            } else {
                match batch.column_by_name(name) {
                    Some(column) if column.data_type() == field.data_type() => column.clone(),
                    Some(column) if column.data_type() == &DataType::Null => {
                        new_null_array(field.data_type(), rows)
                    }
                    Some(column) => cast_with_options(column, field.data_type(), &strict)
                        .context(ColumnMismatchSnafu {
                            path: location,
                            column: name.as_str(),
                        })?,
                    None => new_null_array(field.data_type(), rows),
                }
            };
            Ok(column)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    RecordBatch::try_new(schema.clone(), columns).context(DecodeSnafu { pattern: location })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use crate::sink::{PartitionedWriter, WriterConfig};
    use parquet::arrow::ArrowWriter;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_parquet(dir: &Path, rel: &str, batch: &RecordBatch) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
    }

    fn song_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, true),
            Field::new("title", DataType::Utf8, true),
            Field::new("year", DataType::Int64, true),
            Field::new("duration", DataType::Float64, true),
            Field::new("artist_id", DataType::Utf8, true),
        ]))
    }

    fn stored_batch(ids: Vec<&str>, durations: Vec<f64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, true),
            Field::new("title", DataType::Utf8, true),
            Field::new("duration", DataType::Float64, true),
        ]));
        let titles: Vec<&str> = ids.iter().map(|_| "t").collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(titles)),
                Arc::new(Float64Array::from(durations)),
            ],
        )
        .unwrap()
    }

    fn partitions() -> Vec<String> {
        vec!["year".to_string(), "artist_id".to_string()]
    }

    #[tokio::test]
    async fn test_rebuilds_partition_columns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("song.parquet");
        write_parquet(
            &root,
            "year=2018/artist_id=AR1/part-00000.parquet",
            &stored_batch(vec!["SOA", "SOB"], vec![1.0, 2.0]),
        );
        write_parquet(
            &root,
            "year=__HIVE_DEFAULT_PARTITION__/artist_id=AR%2F2/part-00000.parquet",
            &stored_batch(vec!["SOC"], vec![3.0]),
        );
        std::fs::write(root.join("_SUCCESS"), b"").unwrap();

        let pool = StoragePool::new(HashMap::new());
        let table = read_parquet_table(
            &pool,
            root.to_str().unwrap(),
            song_schema(),
            &partitions(),
        )
        .await
        .unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.schema(), song_schema());

        let artist = table
            .column_by_name("artist_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let year = table
            .column_by_name("year")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();

        let mut seen: Vec<(Option<i64>, String)> = (0..table.num_rows())
            .map(|i| {
                let y = if year.is_null(i) { None } else { Some(year.value(i)) };
                (y, artist.value(i).to_string())
            })
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (None, "AR/2".to_string()),
                (Some(2018), "AR1".to_string()),
                (Some(2018), "AR1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_reads_back_escaped_values_written_by_sink() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("song.parquet");
        let url = root.to_str().unwrap();
        let songs = RecordBatch::try_new(
            song_schema(),
            vec![
                Arc::new(StringArray::from(vec!["SOA", "SOB"])),
                Arc::new(StringArray::from(vec!["Rokkoo", "Intro"])),
                Arc::new(Int64Array::from(vec![0, 1999])),
                Arc::new(Float64Array::from(vec![189.9, 60.0])),
                Arc::new(StringArray::from(vec!["AR:1", "AR%'2"])),
            ],
        )
        .unwrap();

        let pool = Arc::new(StoragePool::new(HashMap::new()));
        PartitionedWriter::new(Arc::clone(&pool), WriterConfig::default())
            .write("song", &songs, url, &partitions())
            .await
            .unwrap();

        let table = read_parquet_table(&pool, url, song_schema(), &partitions())
            .await
            .unwrap();

        let artist = table
            .column_by_name("artist_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let mut ids: Vec<&str> = (0..table.num_rows()).map(|i| artist.value(i)).collect();
        ids.sort();
        assert_eq!(ids, vec!["AR%'2", "AR:1"]);
    }

    #[tokio::test]
    async fn test_marker_only_table_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("song.parquet");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("_SUCCESS"), b"").unwrap();

        let pool = StoragePool::new(HashMap::new());
        let table = read_parquet_table(&pool, root.to_str().unwrap(), song_schema(), &partitions())
            .await
            .unwrap();

        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 5);
    }

    #[tokio::test]
    async fn test_missing_table_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("song.parquet");

        let pool = StoragePool::new(HashMap::new());
        let err = read_parquet_table(&pool, root.to_str().unwrap(), song_schema(), &partitions())
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::NoMatchingFiles { .. }));
    }

    #[tokio::test]
    async fn test_bad_partition_value_is_a_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("song.parquet");
        write_parquet(
            &root,
            "year=abc/artist_id=AR1/part-00000.parquet",
            &stored_batch(vec!["SOA"], vec![1.0]),
        );

        let pool = StoragePool::new(HashMap::new());
        let err = read_parquet_table(&pool, root.to_str().unwrap(), song_schema(), &partitions())
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_data_file_filter() {
        assert!(is_data_file("year=2018/part-00000.snappy.parquet"));
        assert!(!is_data_file("_SUCCESS"));
        assert!(!is_data_file("_temporary/part-00000.parquet"));
        assert!(!is_data_file("year=2018/.part-00000.parquet.crc"));
    }
}
