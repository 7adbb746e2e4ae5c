//! Event log stage: `log_data` into the user, time and song play tables.
//!
//! The `NextSong` filter runs once. Its output feeds the user table, the
//! time table and the fact join, so the three stay row-aligned: a play with
//! an undecodable timestamp still counts as a user row but is left out of
//! the time and fact tables.

use std::sync::Arc;
use std::time::Instant;

use arrow::datatypes::{DataType, Field};
use snafu::ResultExt;
use tracing::{info, warn};

use playlake_core::emit;
use playlake_core::metrics::events::{
    AmbiguousJoinMatches, DropReason, RowsDropped, StageCompleted,
};

use super::Pipeline;
use super::stats::LogStageStats;
use crate::error::{ErrorKind, PipelineError, SourceSnafu, TableSnafu, TimeSnafu};
use crate::schema::{Table, derived, raw};
use crate::table::{self, Projection};
use crate::time::decompose_timestamps;

/// Stage and metric label for the event source.
pub const LOG_DATA: &str = "log_data";

/// Fact columns filled from a differently named event column.
const SONGPLAY_RENAMES: [(&str, &str); 4] = [
    ("start_time", raw::TS),
    ("user_id", raw::USER_ID),
    ("session_id", raw::SESSION_ID),
    ("user_agent", raw::USER_AGENT),
];

impl Pipeline {
    /// Read the event log and write the user, time and song play tables.
    ///
    /// The song table must already be stored: plays are matched against the
    /// catalog as read back from its output location.
    pub async fn process_log_data(&self) -> Result<LogStageStats, PipelineError> {
        let start = Instant::now();
        let pattern = self.config.log_data_pattern();
        info!(pattern = %pattern, "Processing log data");

        let events = self
            .engine
            .read_json(&pattern)
            .await
            .context(SourceSnafu { table: LOG_DATA })?;

        let plays = self
            .engine
            .filter_eq(&events, raw::PAGE, raw::NEXT_SONG)
            .context(TableSnafu { table: LOG_DATA })?;

        let mut stats = LogStageStats {
            events: events.num_rows() as u64,
            plays: plays.num_rows() as u64,
            ..Default::default()
        };
        emit!(RowsDropped {
            rows: stats.events - stats.plays,
            reason: DropReason::NotAPlay,
            table: LOG_DATA.to_string(),
        });
        info!(events = stats.events, plays = stats.plays, "Filtered song plays");

        // Users
        let users = self
            .engine
            .project(&plays, &Projection::identity(&Table::User.schema()))
            .context(TableSnafu {
                table: Table::User.name(),
            })?;
        stats.tables.push(self.write_table(Table::User, &users).await?);

        // Time
        let times = decompose_timestamps(&plays, raw::TS, self.offset, Table::Time.schema())
            .context(TimeSnafu {
                table: Table::Time.name(),
            })?;
        stats.malformed_timestamps = times.dropped as u64;
        if times.dropped > 0 {
            warn!(
                kind = %ErrorKind::MalformedTimestamp,
                rows = times.dropped,
                "Dropping plays with a null or non-numeric timestamp"
            );
            emit!(RowsDropped {
                rows: times.dropped as u64,
                reason: DropReason::MalformedTimestamp,
                table: Table::Time.name().to_string(),
            });
        }
        stats
            .tables
            .push(self.write_table(Table::Time, &times.time_table).await?);

        // Song plays
        let songplay = Table::SongPlay.name();
        let dated = table::with_columns(
            &plays,
            vec![
                (
                    Arc::new(Field::new(derived::YEAR, DataType::Int32, true)),
                    times.year.clone(),
                ),
                (
                    Arc::new(Field::new(derived::MONTH, DataType::Int32, true)),
                    times.month.clone(),
                ),
            ],
        )
        .and_then(|batch| table::filter_mask(&batch, &times.valid))
        .context(TableSnafu { table: songplay })?;

        let song_layout = self.config.layout(Table::Song);
        let catalog = self
            .engine
            .read_parquet(
                &self.config.table_url(&song_layout),
                Table::Song.schema(),
                &song_layout.partition_by,
            )
            .await
            .context(SourceSnafu {
                table: Table::Song.name(),
            })?;
        let catalog = self
            .engine
            .project(
                &catalog,
                &Projection::identity(&Table::Song.schema()).select(&[
                    raw::TITLE,
                    raw::DURATION,
                    raw::SONG_ID,
                    raw::ARTIST_ID,
                ]),
            )
            .context(TableSnafu { table: songplay })?;

        let joined = self
            .engine
            .join(
                &dated,
                &catalog,
                &[raw::SONG, raw::LENGTH],
                &[raw::TITLE, raw::DURATION],
            )
            .context(TableSnafu { table: songplay })?;

        stats.unmatched_plays = joined.unmatched_rows;
        stats.ambiguous_plays = joined.ambiguous_rows;
        stats.extra_fact_rows = joined.extra_rows;

        if joined.ambiguous_rows > 0 {
            warn!(
                kind = %ErrorKind::JoinAmbiguity,
                plays = joined.ambiguous_rows,
                extra_rows = joined.extra_rows,
                "Plays matched more than one catalog song"
            );
            emit!(AmbiguousJoinMatches {
                events: joined.ambiguous_rows,
                extra_rows: joined.extra_rows,
            });
        }
        if joined.unmatched_rows > 0 {
            info!(
                plays = joined.unmatched_rows,
                "Plays without a catalog match left out of songplay"
            );
            emit!(RowsDropped {
                rows: joined.unmatched_rows,
                reason: DropReason::Unmatched,
                table: songplay.to_string(),
            });
        }

        let facts = self
            .engine
            .project(
                &joined.batch,
                &Projection::renamed(&Table::SongPlay.schema(), &SONGPLAY_RENAMES),
            )
            .context(TableSnafu { table: songplay })?;
        stats
            .tables
            .push(self.write_table(Table::SongPlay, &facts).await?);

        emit!(StageCompleted {
            stage: LOG_DATA,
            duration: start.elapsed(),
        });
        info!(
            plays = stats.plays,
            facts = facts.num_rows(),
            duration_ms = start.elapsed().as_millis(),
            "Log data processed"
        );

        Ok(stats)
    }
}
