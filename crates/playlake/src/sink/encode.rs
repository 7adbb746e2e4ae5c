//! Parquet encoding of one data file.

use arrow::array::RecordBatch;
use bytes::{BufMut, Bytes, BytesMut};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;

use playlake_core::ParquetCompression;

/// Writer properties for the configured codec.
pub fn writer_properties(compression: ParquetCompression) -> WriterProperties {
    let builder = WriterProperties::builder();

    let builder = builder.set_compression(match compression {
        ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
        ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        ParquetCompression::Lz4 => Compression::LZ4,
    });

    builder.build()
}

/// Name of the single data file written per directory.
///
/// Fixed rather than random, so a re-run over the same input replaces each
/// file in place.
pub fn data_file_name(compression: ParquetCompression) -> String {
    match compression.file_tag() {
        Some(tag) => format!("part-00000.{tag}.parquet"),
        None => "part-00000.parquet".to_string(),
    }
}

/// Encode `batch` as a complete Parquet file.
pub fn encode_batch(
    batch: &RecordBatch,
    compression: ParquetCompression,
) -> Result<Bytes, ParquetError> {
    let mut writer = ArrowWriter::try_new(
        BytesMut::new().writer(),
        batch.schema(),
        Some(writer_properties(compression)),
    )?;
    writer.write(batch)?;
    let buffer = writer.into_inner()?;
    Ok(buffer.into_inner().freeze())
}
