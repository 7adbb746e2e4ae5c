//! Song catalog stage: `song_data` into the song and artist tables.

use std::time::Instant;

use snafu::ResultExt;
use tracing::info;

use playlake_core::emit;
use playlake_core::metrics::events::StageCompleted;

use super::Pipeline;
use super::stats::SongStageStats;
use crate::error::{PipelineError, SourceSnafu, TableSnafu};
use crate::schema::Table;
use crate::table::Projection;

/// Stage and metric label for the catalog source.
pub const SONG_DATA: &str = "song_data";

impl Pipeline {
    /// Read the song catalog and write the song and artist tables.
    ///
    /// Both tables are straight column selections; every catalog record
    /// produces one row in each.
    pub async fn process_song_data(&self) -> Result<SongStageStats, PipelineError> {
        let start = Instant::now();
        let pattern = self.config.song_data_pattern();
        info!(pattern = %pattern, "Processing song data");

        let catalog = self
            .engine
            .read_json(&pattern)
            .await
            .context(SourceSnafu { table: SONG_DATA })?;

        let mut stats = SongStageStats {
            records: catalog.num_rows() as u64,
            tables: Vec::with_capacity(2),
        };

        for table in [Table::Song, Table::Artist] {
            let projected = self
                .engine
                .project(&catalog, &Projection::identity(&table.schema()))
                .context(TableSnafu {
                    table: table.name(),
                })?;
            stats.tables.push(self.write_table(table, &projected).await?);
        }

        emit!(StageCompleted {
            stage: SONG_DATA,
            duration: start.elapsed(),
        });
        info!(
            records = stats.records,
            duration_ms = start.elapsed().as_millis(),
            "Song data processed"
        );

        Ok(stats)
    }
}
