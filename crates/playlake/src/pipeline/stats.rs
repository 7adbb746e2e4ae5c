//! Run statistics.

use std::time::Duration;

use crate::schema::Table;
use crate::sink::WriteSummary;

/// Counters from the song catalog stage.
#[derive(Debug, Clone, Default)]
pub struct SongStageStats {
    /// Catalog records read.
    pub records: u64,
    pub tables: Vec<WriteSummary>,
}

/// Counters from the event log stage.
#[derive(Debug, Clone, Default)]
pub struct LogStageStats {
    /// Event records read, of any page.
    pub events: u64,
    /// Events with `page = "NextSong"`.
    pub plays: u64,
    /// Plays whose timestamp could not be decoded.
    pub malformed_timestamps: u64,
    /// Plays that matched no catalog song.
    pub unmatched_plays: u64,
    /// Plays that matched more than one catalog song.
    pub ambiguous_plays: u64,
    /// Fact rows produced beyond one per matched play.
    pub extra_fact_rows: u64,
    pub tables: Vec<WriteSummary>,
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub song: SongStageStats,
    pub log: LogStageStats,
    pub duration: Duration,
}

impl RunSummary {
    /// Write summaries of all tables, in the order they were written.
    pub fn tables(&self) -> impl Iterator<Item = &WriteSummary> {
        self.song.tables.iter().chain(self.log.tables.iter())
    }

    /// Write summary of one table.
    pub fn table(&self, table: Table) -> Option<&WriteSummary> {
        self.tables().find(|summary| summary.table == table.name())
    }
}
