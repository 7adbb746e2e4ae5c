//! Output tables and their Arrow schemas.
//!
//! Column types are pinned here rather than taken from whatever the JSON
//! inference produced, so that a run over a sparse input (a field that is
//! always null, a year that is always an integer) writes the same Parquet
//! schema as a run over the full dataset.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Raw field names of the source records.
pub mod raw {
    // Song catalog
    pub const SONG_ID: &str = "song_id";
    pub const TITLE: &str = "title";
    pub const ARTIST_ID: &str = "artist_id";
    pub const YEAR: &str = "year";
    pub const DURATION: &str = "duration";

    // Event log
    pub const TS: &str = "ts";
    pub const USER_ID: &str = "userId";
    pub const LEVEL: &str = "level";
    pub const PAGE: &str = "page";
    pub const SONG: &str = "song";
    pub const LENGTH: &str = "length";
    pub const SESSION_ID: &str = "sessionId";
    pub const LOCATION: &str = "location";
    pub const USER_AGENT: &str = "userAgent";

    /// Value of `page` that marks a song play.
    pub const NEXT_SONG: &str = "NextSong";
}

/// Derived calendar columns added to play events before the fact table is built.
pub mod derived {
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
}

fn utf8(name: &str) -> Field {
    Field::new(name, DataType::Utf8, true)
}

fn int32(name: &str) -> Field {
    Field::new(name, DataType::Int32, true)
}

fn int64(name: &str) -> Field {
    Field::new(name, DataType::Int64, true)
}

fn float64(name: &str) -> Field {
    Field::new(name, DataType::Float64, true)
}

static SONG_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("song_id"),
        utf8("title"),
        utf8("artist_id"),
        int64("year"),
        float64("duration"),
    ]))
});

static ARTIST_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("artist_id"),
        utf8("artist_name"),
        utf8("artist_location"),
        float64("artist_latitude"),
        float64("artist_longitude"),
    ]))
});

static USER_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("userId"),
        utf8("firstName"),
        utf8("lastName"),
        utf8("gender"),
        utf8("level"),
    ]))
});

static TIME_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("start_time"),
        int32("hour"),
        int32("day"),
        int32("week"),
        int32("month"),
        int32("year"),
        int32("weekday"),
    ]))
});

static SONGPLAY_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        int64("start_time"),
        int32("year"),
        int32("month"),
        utf8("user_id"),
        utf8("level"),
        utf8("song_id"),
        utf8("artist_id"),
        int64("session_id"),
        utf8("location"),
        utf8("user_agent"),
    ]))
});

/// The five tables of the star schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Song,
    Artist,
    User,
    Time,
    SongPlay,
}

impl Table {
    /// All tables, in the order a run writes them.
    pub const ALL: [Table; 5] = [
        Table::Song,
        Table::Artist,
        Table::User,
        Table::Time,
        Table::SongPlay,
    ];

    /// Short name used in config keys, logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Song => "song",
            Table::Artist => "artist",
            Table::User => "users",
            Table::Time => "time",
            Table::SongPlay => "songplay",
        }
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            Table::Song => SONG_SCHEMA.clone(),
            Table::Artist => ARTIST_SCHEMA.clone(),
            Table::User => USER_SCHEMA.clone(),
            Table::Time => TIME_SCHEMA.clone(),
            Table::SongPlay => SONGPLAY_SCHEMA.clone(),
        }
    }

    /// Default location relative to the output root.
    pub fn default_path(&self) -> &'static str {
        match self {
            Table::Song => "song/song.parquet",
            Table::Artist => "artist/artist.parquet",
            Table::User => "users/users_parquet",
            Table::Time => "time/time.parquet",
            Table::SongPlay => "songplay/songplay.parquet",
        }
    }

    /// Default partition columns, outermost directory first.
    pub fn default_partition_by(&self) -> &'static [&'static str] {
        match self {
            Table::Song => &["year", "artist_id"],
            Table::Artist => &["artist_id", "artist_name"],
            Table::User | Table::Time => &[],
            Table::SongPlay => &["year", "month"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
