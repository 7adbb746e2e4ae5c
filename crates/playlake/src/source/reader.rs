//! JSON record set reader.
//!
//! Lists the files matching a glob, fetches them concurrently, parses every
//! JSON value they contain (one object per file or one per line, blank lines
//! skipped) and decodes the whole set into a single Arrow batch against the
//! union schema.

use std::sync::Arc;

use arrow::array::{RecordBatch, RecordBatchOptions};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::json::ReaderBuilder;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, info};

use playlake_core::metrics::events::SourceFileRead;
use playlake_core::{StoragePool, emit};

use super::glob::GlobPattern;
use super::inference::infer_union_schema;
use crate::error::{
    DecodeSnafu, MalformedJsonSnafu, NoMatchingFilesSnafu, SourceError, SourceStorageSnafu,
};

/// Configuration for the JSON reader.
#[derive(Debug, Clone)]
pub struct JsonReaderConfig {
    /// Rows per decoded Arrow batch before concatenation.
    pub batch_size: usize,
    /// Number of files fetched concurrently.
    pub fetch_concurrency: usize,
}

impl Default for JsonReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            fetch_concurrency: 16,
        }
    }
}

/// Reads JSON record sets from any location the pool can open.
pub struct JsonReader {
    pool: Arc<StoragePool>,
    config: JsonReaderConfig,
}

impl JsonReader {
    pub fn new(pool: Arc<StoragePool>, config: JsonReaderConfig) -> Self {
        Self { pool, config }
    }

    /// Read every record matched by `pattern` into one batch.
    ///
    /// Columns are the union of the fields observed across all records;
    /// records lacking a field get a null in that column.
    pub async fn read(&self, pattern: &str) -> Result<RecordBatch, SourceError> {
        let glob = GlobPattern::parse(pattern)?;
        let label = source_label(&glob);

        let provider = self
            .pool
            .get_or_create(glob.root())
            .await
            .context(SourceStorageSnafu {
                location: glob.root(),
            })?;

        let keys = provider.list().await.context(SourceStorageSnafu {
            location: glob.root(),
        })?;
        let matched = glob.filter(&keys);
        if matched.is_empty() {
            return NoMatchingFilesSnafu { pattern }.fail();
        }

        debug!(pattern, files = matched.len(), "Matched source files");

        let files: Vec<(String, Bytes)> = futures::stream::iter(matched)
            .map(|key| {
                let provider = provider.clone();
                async move {
                    let bytes = provider.get(&key).await.context(SourceStorageSnafu {
                        location: format!("{}/{}", provider.url(), key),
                    })?;
                    Ok::<_, SourceError>((key, bytes))
                }
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .try_collect()
            .await?;

        let mut records = Vec::new();
        for (key, bytes) in &files {
            let before = records.len();
            parse_values(bytes, &mut records).context(MalformedJsonSnafu {
                path: format!("{}/{}", provider.url(), key),
            })?;
            emit!(SourceFileRead {
                bytes: bytes.len() as u64,
                records: (records.len() - before) as u64,
                table: label.clone(),
            });
        }

        let schema = infer_union_schema(&records, pattern)?;
        let batch = decode(&records, schema, self.config.batch_size, pattern)?;

        info!(
            pattern,
            files = files.len(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "Read source records"
        );
        Ok(batch)
    }
}

/// Metric label for a source: the last literal directory of its glob.
fn source_label(glob: &GlobPattern) -> String {
    glob.root()
        .rsplit('/')
        .next()
        .unwrap_or(glob.root())
        .to_string()
}

/// Parse a stream of concatenated JSON values, appending them to `out`.
fn parse_values(bytes: &[u8], out: &mut Vec<Value>) -> Result<(), serde_json::Error> {
    for value in serde_json::Deserializer::from_slice(bytes).into_iter::<Value>() {
        out.push(value?);
    }
    Ok(())
}

/// Decode parsed records against `schema`.
fn decode(
    records: &[Value],
    schema: SchemaRef,
    batch_size: usize,
    pattern: &str,
) -> Result<RecordBatch, SourceError> {
    if schema.fields().is_empty() {
        let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
        return RecordBatch::try_new_with_options(schema, vec![], &options)
            .context(DecodeSnafu { pattern });
    }

    let batch_size = batch_size.max(1);
    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(batch_size)
        .with_coerce_primitive(true)
        .build_decoder()
        .context(DecodeSnafu { pattern })?;

    let mut batches = Vec::with_capacity(records.len() / batch_size + 1);
    for chunk in records.chunks(batch_size) {
        decoder.serialize(chunk).context(DecodeSnafu { pattern })?;
        if let Some(batch) = decoder.flush().context(DecodeSnafu { pattern })? {
            batches.push(batch);
        }
    }

    concat_batches(&schema, &batches).context(DecodeSnafu { pattern })
}
