//! Epoch timestamp decomposition for the time dimension.
//!
//! Event timestamps are epoch milliseconds. They are floored to whole
//! seconds and rendered in a fixed UTC offset chosen by configuration, never
//! the host's local zone, so the same input always yields the same calendar
//! fields.
//!
//! `week` is the Monday-first week of the year: days before the year's first
//! Monday are week 0, the first Monday starts week 1 (range 0 to 53).
//! `weekday` is ISO numbered, Monday = 1 through Sunday = 7.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Int32Builder, RecordBatch, StringBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type, SchemaRef};
use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::error::TimeError;

/// Calendar fields of one event timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDimensionRow {
    /// Wall-clock time, `HH:MM:SS`.
    pub start_time: String,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

/// Convert epoch milliseconds to a date-time in `offset`.
pub fn epoch_millis_to_datetime(
    ts: i64,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, TimeError> {
    let seconds = ts.div_euclid(1000);
    DateTime::from_timestamp(seconds, 0)
        .map(|utc| utc.with_timezone(&offset))
        .ok_or(TimeError::OutOfRange { ts })
}

/// Monday-first week of the year (`%W`).
fn monday_week(datetime: &DateTime<FixedOffset>) -> i32 {
    let ordinal0 = datetime.ordinal0() as i32;
    let weekday0 = datetime.weekday().num_days_from_monday() as i32;
    (ordinal0 + 7 - weekday0) / 7
}

/// Decompose epoch milliseconds into calendar fields in `offset`.
pub fn epoch_millis_to_calendar_fields(
    ts: i64,
    offset: FixedOffset,
) -> Result<TimeDimensionRow, TimeError> {
    let datetime = epoch_millis_to_datetime(ts, offset)?;
    Ok(TimeDimensionRow {
        start_time: datetime.format("%H:%M:%S").to_string(),
        hour: datetime.hour() as i32,
        day: datetime.day() as i32,
        week: monday_week(&datetime),
        month: datetime.month() as i32,
        year: datetime.year(),
        weekday: datetime.weekday().number_from_monday() as i32,
    })
}

/// Wall-clock `HH:MM:SS` of an optional timestamp.
pub fn decompose_start_time(ts: Option<i64>, offset: FixedOffset) -> Result<String, TimeError> {
    let ts = ts.ok_or(TimeError::NullTimestamp)?;
    Ok(epoch_millis_to_datetime(ts, offset)?
        .format("%H:%M:%S")
        .to_string())
}

/// Calendar columns decoded from a timestamp column.
#[derive(Debug)]
pub struct DecomposedTimes {
    /// One entry per input row, false where the timestamp could not be
    /// decoded.
    pub valid: BooleanArray,
    /// Time dimension rows for the valid entries only, in input order.
    pub time_table: RecordBatch,
    /// `year` per input row (null where invalid).
    pub year: ArrayRef,
    /// `month` per input row (null where invalid).
    pub month: ArrayRef,
    /// Number of rows that could not be decoded.
    pub dropped: usize,
}

/// Decompose every value of `column` in `batch`.
///
/// Values are read as 64-bit integers; strings are parsed and anything that
/// does not parse, or is null, counts as malformed. A column whose type can
/// never hold a number is an error for the whole column.
pub fn decompose_timestamps(
    batch: &RecordBatch,
    column: &str,
    offset: FixedOffset,
    time_schema: SchemaRef,
) -> Result<DecomposedTimes, TimeError> {
    let rows = batch.num_rows();
    let ts: Option<ArrayRef> = match batch.column_by_name(column) {
        None => None,
        Some(array) => match array.data_type() {
            DataType::Int64 => Some(array.clone()),
            DataType::Null => None,
            data_type if data_type.is_numeric() || data_type == &DataType::Utf8 => {
                Some(cast(array, &DataType::Int64).map_err(|_| TimeError::UnsupportedType {
                    column: column.to_string(),
                    data_type: data_type.to_string(),
                })?)
            }
            data_type => {
                return Err(TimeError::UnsupportedType {
                    column: column.to_string(),
                    data_type: data_type.to_string(),
                });
            }
        },
    };

    let mut valid = Vec::with_capacity(rows);
    let mut start_time = StringBuilder::new();
    let mut hour = Int32Builder::new();
    let mut day = Int32Builder::new();
    let mut week = Int32Builder::new();
    let mut month = Int32Builder::new();
    let mut year = Int32Builder::new();
    let mut weekday = Int32Builder::new();
    let mut row_year = Int32Builder::with_capacity(rows);
    let mut row_month = Int32Builder::with_capacity(rows);

    let values = ts.as_ref().map(|a| a.as_primitive::<Int64Type>());
    for i in 0..rows {
        let value = values.and_then(|v| v.is_valid(i).then(|| v.value(i)));
        match value.map(|ts| epoch_millis_to_calendar_fields(ts, offset)) {
            Some(Ok(fields)) => {
                valid.push(true);
                start_time.append_value(&fields.start_time);
                hour.append_value(fields.hour);
                day.append_value(fields.day);
                week.append_value(fields.week);
                month.append_value(fields.month);
                year.append_value(fields.year);
                weekday.append_value(fields.weekday);
                row_year.append_value(fields.year);
                row_month.append_value(fields.month);
            }
            _ => {
                valid.push(false);
                row_year.append_null();
                row_month.append_null();
            }
        }
    }

    let dropped = valid.iter().filter(|v| !**v).count();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(start_time.finish()),
        Arc::new(hour.finish()),
        Arc::new(day.finish()),
        Arc::new(week.finish()),
        Arc::new(month.finish()),
        Arc::new(year.finish()),
        Arc::new(weekday.finish()),
    ];
    let time_table =
        RecordBatch::try_new(time_schema, columns).map_err(|e| TimeError::Assemble {
            message: e.to_string(),
        })?;

    Ok(DecomposedTimes {
        valid: BooleanArray::from(valid),
        time_table,
        year: Arc::new(row_year.finish()),
        month: Arc::new(row_month.finish()),
        dropped,
    })
}
