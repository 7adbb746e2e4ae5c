//! In-memory table operations on Arrow record batches.

mod join;
mod projection;

pub use join::{Joined, inner_join};
pub use projection::{Projection, project};

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, RecordBatch, Scalar, StringArray};
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{DataType, FieldRef, Schema};
use snafu::{OptionExt, ResultExt};

use crate::error::{ArrowSnafu, CastSnafu, DuplicateColumnSnafu, MissingColumnSnafu, TableError};

/// Keep the rows whose `column` equals `value`. Nulls never match.
///
/// Non-string columns are compared through their string form.
pub fn filter_eq(batch: &RecordBatch, column: &str, value: &str) -> Result<RecordBatch, TableError> {
    let array = batch
        .column_by_name(column)
        .context(MissingColumnSnafu { column })?;
    let array = match array.data_type() {
        DataType::Utf8 => array.clone(),
        _ => cast(array, &DataType::Utf8).context(CastSnafu { column })?,
    };

    let scalar = Scalar::new(StringArray::from(vec![value]));
    let mask = eq(&array, &scalar).context(ArrowSnafu)?;
    filter_record_batch(batch, &mask).context(ArrowSnafu)
}

/// Keep the rows where `mask` is true.
pub fn filter_mask(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch, TableError> {
    filter_record_batch(batch, mask).context(ArrowSnafu)
}

/// Append columns to `batch`.
pub fn with_columns(
    batch: &RecordBatch,
    columns: Vec<(FieldRef, ArrayRef)>,
) -> Result<RecordBatch, TableError> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut arrays = batch.columns().to_vec();

    for (field, array) in columns {
        if schema.field_with_name(field.name()).is_ok() {
            return DuplicateColumnSnafu {
                column: field.name().as_str(),
            }
            .fail();
        }
        fields.push(field);
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context(ArrowSnafu)
}
