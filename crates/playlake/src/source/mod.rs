//! Source readers.
//!
//! Raw JSON record sets are read through glob patterns over object storage;
//! tables this job has already written are read back from their Parquet
//! layout.

mod glob;
mod inference;
mod reader;
mod readback;

pub use glob::GlobPattern;
pub use inference::infer_union_schema;
pub use reader::{JsonReader, JsonReaderConfig};
pub use readback::read_parquet_table;
