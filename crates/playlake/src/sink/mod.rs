//! Sink components for writing tables as partitioned Parquet datasets.

mod encode;
mod writer;

pub use encode::{data_file_name, encode_batch, writer_properties};
pub use writer::{PartitionedWriter, SUCCESS_MARKER, WriteSummary, WriterConfig};
