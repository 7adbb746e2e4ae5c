//! Configuration for the playlake ETL.
//!
//! Every field has a default, so an empty file (or no file at all) runs the
//! job against the stock input and output buckets.

use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schema::Table;
pub use playlake_core::config::{OutputDir, ParquetCompression};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "playlake")]
#[command(about = "Build a star-schema Parquet dataset from song and event logs")]
pub struct CliArgs {
    /// Path to a YAML config file. Defaults are used when omitted.
    #[arg(short, long, env = "PLAYLAKE_CONFIG")]
    pub config: Option<PathBuf>,
}

fn default_input_root() -> String {
    "s3a://udacity-dend".to_string()
}

fn default_output_root() -> String {
    "s3a://udacity-dend-project-output".to_string()
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Reference time zone for timestamp decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Fixed offset such as `+00:00` or `-05:30`. `Z` and `UTC` mean `+00:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

impl TimeConfig {
    /// Parse the configured offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        let value = self.utc_offset.trim();
        if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
            return Ok(Utc.fix());
        }
        value
            .parse::<FixedOffset>()
            .map_err(|_| ConfigError::InvalidUtcOffset {
                value: self.utc_offset.clone(),
            })
    }
}

/// Output file settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,
}

/// Per-table override of location and partitioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOverride {
    /// Location relative to the output root.
    pub path: Option<String>,
    /// Partition columns, outermost first. An empty list writes unpartitioned.
    pub partition_by: Option<Vec<String>>,
}

/// Overrides keyed by table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default)]
    pub song: TableOverride,
    #[serde(default)]
    pub artist: TableOverride,
    #[serde(default)]
    pub users: TableOverride,
    #[serde(default)]
    pub time: TableOverride,
    #[serde(default)]
    pub songplay: TableOverride,
}

impl TablesConfig {
    fn get(&self, table: Table) -> &TableOverride {
        match table {
            Table::Song => &self.song,
            Table::Artist => &self.artist,
            Table::User => &self.users,
            Table::Time => &self.time,
            Table::SongPlay => &self.songplay,
        }
    }
}

/// Resolved location and partitioning of one output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub path: String,
    pub partition_by: Vec<String>,
}

/// Main configuration for playlake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root holding `song_data/` and `log_data/`.
    #[serde(default = "default_input_root")]
    pub input_root: String,
    /// Root the five tables are written under.
    #[serde(default = "default_output_root")]
    pub output_root: String,
    /// Options for the object store clients (credentials, region, endpoint).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub tables: TablesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
            storage_options: HashMap::new(),
            time: TimeConfig::default(),
            sink: SinkConfig::default(),
            tables: TablesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = playlake_core::config::load_yaml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to null, not to an empty mapping.
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            playlake_core::config::parse_yaml(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_root.trim().is_empty() {
            return Err(ConfigError::EmptyInputRoot);
        }
        if self.output_root.trim().is_empty() {
            return Err(ConfigError::EmptyOutputRoot);
        }
        self.time.offset()?;

        let mut dirs = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let layout = self.layout(table);
            validate_layout(table, &layout)?;
            dirs.push((table.name(), OutputDir::new(&layout.path)));
        }

        if let Some((first, second)) = OutputDir::conflicts(&dirs).into_iter().next() {
            return Err(ConfigError::OverlappingOutputs {
                first: first.to_string(),
                second: second.to_string(),
            });
        }

        Ok(())
    }

    /// Location and partitioning of `table`, with overrides applied.
    pub fn layout(&self, table: Table) -> TableLayout {
        let overrides = self.tables.get(table);
        TableLayout {
            path: overrides
                .path
                .clone()
                .unwrap_or_else(|| table.default_path().to_string()),
            partition_by: overrides.partition_by.clone().unwrap_or_else(|| {
                table
                    .default_partition_by()
                    .iter()
                    .map(|c| c.to_string())
                    .collect()
            }),
        }
    }

    /// Glob over the song catalog files.
    pub fn song_data_pattern(&self) -> String {
        format!("{}/song_data/*/*/*/*.json", self.input_root.trim_end_matches('/'))
    }

    /// Glob over the event log files.
    pub fn log_data_pattern(&self) -> String {
        format!("{}/log_data/*/*/*.json", self.input_root.trim_end_matches('/'))
    }

    /// Full URL of a table location.
    pub fn table_url(&self, layout: &TableLayout) -> String {
        format!(
            "{}/{}",
            self.output_root.trim_end_matches('/'),
            layout.path.trim_matches('/')
        )
    }
}

fn validate_layout(table: Table, layout: &TableLayout) -> Result<(), ConfigError> {
    if layout.path.trim_matches('/').is_empty() {
        return Err(ConfigError::EmptyTablePath {
            table: table.name().to_string(),
        });
    }

    let schema = table.schema();
    for (i, column) in layout.partition_by.iter().enumerate() {
        if schema.field_with_name(column).is_err() {
            return Err(ConfigError::UnknownPartitionColumn {
                table: table.name().to_string(),
                column: column.clone(),
            });
        }
        if layout.partition_by[..i].contains(column) {
            return Err(ConfigError::DuplicatePartitionColumn {
                table: table.name().to_string(),
                column: column.clone(),
            });
        }
    }

    if layout.partition_by.len() >= schema.fields().len() {
        return Err(ConfigError::PartitionByAllColumns {
            table: table.name().to_string(),
        });
    }

    Ok(())
}
