//! Hive-style partition directory names.
//!
//! Partitioned tables store their partition columns in the directory tree
//! (`year=2018/artist_id=AR5KOSW1187FB35FF4/part-00000.snappy.parquet`)
//! rather than inside the data files. This module builds those directory
//! names on write and recovers the values on read.

use std::collections::HashMap;

/// Directory value used for a null partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Whether a character must be percent-escaped inside a partition directory name.
fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{1F}'
            | '\u{7F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '['
            | ']'
            | '^'
            | '{'
            | '}'
            | '|'
            | '<'
            | '>'
            | '~'
            | '`'
    )
}

/// Escape a partition value for use in a directory name.
///
/// ```
/// use playlake_core::partition::escape_partition_value;
///
/// assert_eq!(escape_partition_value("AC/DC"), "AC%2FDC");
/// assert_eq!(escape_partition_value("Casual"), "Casual");
/// ```
pub fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Reverse [`escape_partition_value`].
///
/// Malformed escapes (a `%` not followed by two hex digits) are kept verbatim.
pub fn unescape_partition_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(decoded) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(decoded);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build the directory prefix for one partition.
///
/// Values are given in partition column order. `None` and the empty string
/// both land in [`DEFAULT_PARTITION`].
///
/// ```
/// use playlake_core::partition::partition_prefix;
///
/// let prefix = partition_prefix(&[("year", Some("2018")), ("month", None)]);
/// assert_eq!(prefix, "year=2018/month=__HIVE_DEFAULT_PARTITION__");
/// ```
pub fn partition_prefix(values: &[(&str, Option<&str>)]) -> String {
    values
        .iter()
        .map(|(column, value)| {
            let value = match value {
                Some(v) if !v.is_empty() => escape_partition_value(v),
                _ => DEFAULT_PARTITION.to_string(),
            };
            format!("{column}={value}")
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts the values of the configured partition columns from file paths.
///
/// Extracted values are unescaped; [`DEFAULT_PARTITION`] becomes `None`.
///
/// # Examples
///
/// ```
/// use playlake_core::PartitionExtractor;
///
/// let extractor = PartitionExtractor::new(vec!["year".into(), "artist_id".into()]);
/// let values = extractor.extract("year=2018/artist_id=AR123/part-00000.parquet");
/// assert_eq!(values.get("year"), Some(&Some("2018".to_string())));
/// assert_eq!(values.get("artist_id"), Some(&Some("AR123".to_string())));
/// ```
#[derive(Debug, Clone)]
pub struct PartitionExtractor {
    columns: Vec<String>,
}

impl PartitionExtractor {
    /// Create an extractor for specific partition columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Extract partition values from a path relative to the table root.
    ///
    /// Only directory segments are considered; the final segment is the file
    /// name and never holds a partition value.
    pub fn extract(&self, path: &str) -> HashMap<String, Option<String>> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        segments.pop();

        segments
            .into_iter()
            .filter_map(|segment| {
                let (key, raw) = segment.split_once('=')?;
                if !self.columns.iter().any(|c| c == key) {
                    return None;
                }
                let value = if raw == DEFAULT_PARTITION {
                    None
                } else {
                    Some(unescape_partition_value(raw))
                };
                Some((key.to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape_partition_value("a=b"), "a%3Db");
        assert_eq!(escape_partition_value("100%"), "100%25");
        assert_eq!(escape_partition_value("What?"), "What%3F");
        assert_eq!(escape_partition_value("Guns N' Roses"), "Guns N%27 Roses");
    }

    #[test]
    fn test_escape_keeps_unicode_and_spaces() {
        assert_eq!(escape_partition_value("Sigur Rós"), "Sigur Rós");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        for value in ["AC/DC", "a=b:c", "100%", "Tom's \"Diner\"", "plain"] {
            assert_eq!(unescape_partition_value(&escape_partition_value(value)), value);
        }
    }

    #[test]
    fn test_unescape_keeps_malformed_sequences() {
        assert_eq!(unescape_partition_value("50%"), "50%");
        assert_eq!(unescape_partition_value("%zz"), "%zz");
    }

    #[test]
    fn test_partition_prefix_orders_columns_as_given() {
        let prefix = partition_prefix(&[("artist_id", Some("AR1")), ("artist_name", Some("AC/DC"))]);
        assert_eq!(prefix, "artist_id=AR1/artist_name=AC%2FDC");
    }

    #[test]
    fn test_escape_covers_object_store_unsafe_characters() {
        assert_eq!(escape_partition_value("a|b<c>~`}"), "a%7Cb%3Cc%3E%7E%60%7D");
        assert_eq!(escape_partition_value("nul\u{0}"), "nul%00");
    }

    #[test]
    fn test_partition_prefix_empty_string_is_default() {
        let prefix = partition_prefix(&[("artist_location", Some("")), ("year", Some("0"))]);
        assert_eq!(prefix, "artist_location=__HIVE_DEFAULT_PARTITION__/year=0");
    }

    #[test]
    fn test_partition_prefix_empty() {
        assert_eq!(partition_prefix(&[]), "");
    }

    #[test]
    fn test_extract_nested_partitions() {
        let extractor = PartitionExtractor::new(vec!["year".into(), "month".into()]);
        let values = extractor.extract("year=2018/month=11/part-00000.snappy.parquet");

        assert_eq!(values.len(), 2);
        assert_eq!(values.get("year"), Some(&Some("2018".to_string())));
        assert_eq!(values.get("month"), Some(&Some("11".to_string())));
    }

    #[test]
    fn test_extract_ignores_file_name() {
        let extractor = PartitionExtractor::new(vec!["weird".into()]);
        let values = extractor.extract("weird=name.parquet");
        assert!(values.is_empty());
    }

    #[test]
    fn test_extract_default_partition_is_null() {
        let extractor = PartitionExtractor::new(vec!["year".into()]);
        let values = extractor.extract("year=__HIVE_DEFAULT_PARTITION__/part-00000.parquet");
        assert_eq!(values.get("year"), Some(&None));
    }

    #[test]
    fn test_extract_specific_filters_columns() {
        let extractor = PartitionExtractor::new(vec!["artist_id".into()]);
        let values = extractor.extract("year=2000/artist_id=AR9/part-00000.parquet");

        assert_eq!(values.len(), 1);
        assert_eq!(values.get("artist_id"), Some(&Some("AR9".to_string())));
    }

    #[test]
    fn test_extract_unescapes_values() {
        let extractor = PartitionExtractor::new(vec!["artist_name".into()]);
        let values = extractor.extract("artist_name=AC%2FDC/part-00000.parquet");
        assert_eq!(values.get("artist_name"), Some(&Some("AC/DC".to_string())));
    }

    #[test]
    fn test_extract_unpartitioned_file() {
        let extractor = PartitionExtractor::new(vec!["year".into()]);
        assert!(extractor.extract("part-00000.parquet").is_empty());
    }
}
