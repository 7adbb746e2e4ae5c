//! Column projection onto a pinned target schema.

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions, new_null_array};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, FieldRef, Schema, SchemaRef};
use snafu::ResultExt;

use crate::error::{ArrowSnafu, CastSnafu, TableError};

/// Maps source columns onto the fields of an output schema.
///
/// Each target field names the source column it is filled from. Source
/// columns that are absent become all-null columns of the target type;
/// present columns are cast to it.
#[derive(Debug, Clone)]
pub struct Projection {
    columns: Vec<(String, FieldRef)>,
    schema: SchemaRef,
}

impl Projection {
    /// Project every field of `schema` from the source column of the same name.
    pub fn identity(schema: &SchemaRef) -> Self {
        Self::renamed(schema, &[])
    }

    /// Like [`Projection::identity`], but `renames` lists `(target, source)`
    /// pairs for fields whose source column has a different name.
    pub fn renamed(schema: &SchemaRef, renames: &[(&str, &str)]) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                let source = renames
                    .iter()
                    .find(|(target, _)| target == field.name())
                    .map(|(_, source)| source.to_string())
                    .unwrap_or_else(|| field.name().clone());
                (source, field.clone())
            })
            .collect();

        Self {
            columns,
            schema: schema.clone(),
        }
    }

    /// Keep only the named target fields, in the order given.
    pub fn select(&self, names: &[&str]) -> Self {
        let columns: Vec<(String, FieldRef)> = names
            .iter()
            .filter_map(|name| {
                self.columns
                    .iter()
                    .find(|(_, field)| field.name() == name)
                    .cloned()
            })
            .collect();
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|(_, field)| field.clone())
                .collect::<Vec<_>>(),
        ));
        Self { columns, schema }
    }

    /// The output schema.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

/// Apply `projection` to `batch`.
pub fn project(batch: &RecordBatch, projection: &Projection) -> Result<RecordBatch, TableError> {
    let rows = batch.num_rows();
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };

    let columns = projection
        .columns
        .iter()
        .map(|(source, field)| {
            let column: ArrayRef = match batch.column_by_name(source) {
                Some(column) if column.data_type() == field.data_type() => column.clone(),
                Some(column) if column.data_type() == &DataType::Null => {
                    new_null_array(field.data_type(), rows)
                }
                Some(column) => cast_with_options(column, field.data_type(), &options)
                    .context(CastSnafu {
                        column: source.as_str(),
                    })?,
                None => new_null_array(field.data_type(), rows),
            };
            Ok(column)
        })
        .collect::<Result<Vec<_>, TableError>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    RecordBatch::try_new_with_options(projection.schema(), columns, &options).context(ArrowSnafu)
}
