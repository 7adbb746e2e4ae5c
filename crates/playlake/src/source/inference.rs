//! Union schema inference over parsed JSON records.
//!
//! Every record of every matched file takes part, so a field that only shows
//! up in one file still becomes a column. Conflicting scalar types are
//! widened by Arrow (integer and float become `Float64`, any other scalar mix
//! becomes `Utf8`); an object against a scalar cannot be widened and is a
//! schema conflict.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::json::reader::infer_json_schema_from_iterator;
use serde_json::Value;
use snafu::ResultExt;
use tracing::debug;

use crate::error::{SchemaInferenceSnafu, SourceError};

/// Infer the schema covering every field seen in `records`.
///
/// `pattern` is only used to label errors.
pub fn infer_union_schema(records: &[Value], pattern: &str) -> Result<SchemaRef, SourceError> {
    let schema = infer_json_schema_from_iterator(records.iter().map(Ok))
        .context(SchemaInferenceSnafu { pattern })?;

    debug!(
        pattern,
        records = records.len(),
        fields = ?schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
        "Inferred union schema"
    );

    Ok(Arc::new(schema))
}
