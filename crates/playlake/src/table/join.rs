//! Hash inner join on equality of one or more key columns.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, UInt32Array};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Schema};
use arrow::row::{RowConverter, SortField};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::error::{ArrowSnafu, CastSnafu, DuplicateColumnSnafu, MissingColumnSnafu, TableError};

/// Result of an inner join.
#[derive(Debug)]
pub struct Joined {
    /// Left columns followed by right columns.
    pub batch: RecordBatch,
    /// Left rows that matched more than one right row.
    pub ambiguous_rows: u64,
    /// Output rows beyond one per matched left row.
    pub extra_rows: u64,
    /// Left rows with no match (null keys included).
    pub unmatched_rows: u64,
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, TableError> {
    batch
        .column_by_name(name)
        .context(MissingColumnSnafu { column: name })
}

/// Floating point keys compare `-0.0` equal to `0.0`.
fn normalize_zero(array: ArrayRef) -> ArrayRef {
    match array.data_type() {
        DataType::Float64 => Arc::new(
            array
                .as_primitive::<Float64Type>()
                .unary::<_, Float64Type>(|v| if v == 0.0 { 0.0 } else { v }),
        ),
        DataType::Float32 => Arc::new(
            array
                .as_primitive::<Float32Type>()
                .unary::<_, Float32Type>(|v| if v == 0.0 { 0.0 } else { v }),
        ),
        _ => array,
    }
}

fn all_valid(columns: &[ArrayRef], row: usize) -> bool {
    columns.iter().all(|c| c.is_valid(row))
}

/// Inner join `left` and `right` where `left_on[i] == right_on[i]` for every `i`.
///
/// Rows with a null in any key column never match. Output rows follow left
/// row order, then right row order within one left row. Left key columns are
/// cast to the type of their right counterpart before comparison.
pub fn inner_join(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &[&str],
    right_on: &[&str],
) -> Result<Joined, TableError> {
    if left_on.len() != right_on.len() || left_on.is_empty() {
        return Err(TableError::KeyCount {
            left: left_on.len(),
            right: right_on.len(),
        });
    }

    let left_schema = left.schema();
    let right_schema = right.schema();
    for field in right_schema.fields() {
        if left_schema.field_with_name(field.name()).is_ok() {
            return DuplicateColumnSnafu {
                column: field.name().as_str(),
            }
            .fail();
        }
    }

    let mut left_keys = Vec::with_capacity(left_on.len());
    let mut right_keys = Vec::with_capacity(right_on.len());
    for (l, r) in left_on.iter().zip(right_on) {
        let right_key = column(right, r)?.clone();
        let left_key = column(left, l)?;
        let left_key = if left_key.data_type() == right_key.data_type() {
            left_key.clone()
        } else {
            cast(left_key, right_key.data_type()).context(CastSnafu { column: *l })?
        };
        left_keys.push(normalize_zero(left_key));
        right_keys.push(normalize_zero(right_key));
    }

    let converter = RowConverter::new(
        right_keys
            .iter()
            .map(|k| SortField::new(k.data_type().clone()))
            .collect(),
    )
    .context(ArrowSnafu)?;
    let left_rows = converter.convert_columns(&left_keys).context(ArrowSnafu)?;
    let right_rows = converter.convert_columns(&right_keys).context(ArrowSnafu)?;

    let mut index: HashMap<_, Vec<u32>> = HashMap::new();
    for row in 0..right.num_rows() {
        if all_valid(&right_keys, row) {
            index
                .entry(right_rows.row(row))
                .or_default()
                .push(row as u32);
        }
    }

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    let mut ambiguous_rows = 0u64;
    let mut extra_rows = 0u64;
    let mut unmatched_rows = 0u64;

    for row in 0..left.num_rows() {
        let matches = if all_valid(&left_keys, row) {
            index.get(&left_rows.row(row))
        } else {
            None
        };
        match matches {
            Some(matches) => {
                if matches.len() > 1 {
                    ambiguous_rows += 1;
                    extra_rows += (matches.len() - 1) as u64;
                }
                for &r in matches {
                    left_indices.push(row as u32);
                    right_indices.push(r);
                }
            }
            None => unmatched_rows += 1,
        }
    }

    let left_indices = UInt32Array::from(left_indices);
    let right_indices = UInt32Array::from(right_indices);

    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns());
    for array in left.columns() {
        columns.push(take(array, &left_indices, None).context(ArrowSnafu)?);
    }
    for array in right.columns() {
        columns.push(take(array, &right_indices, None).context(ArrowSnafu)?);
    }

    let fields: Vec<_> = left_schema
        .fields()
        .iter()
        .chain(right_schema.fields().iter())
        .cloned()
        .collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context(ArrowSnafu)?;

    debug!(
        left = left.num_rows(),
        right = right.num_rows(),
        output = batch.num_rows(),
        unmatched = unmatched_rows,
        "Joined"
    );

    Ok(Joined {
        batch,
        ambiguous_rows,
        extra_rows,
        unmatched_rows,
    })
}
