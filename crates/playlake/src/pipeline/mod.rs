//! The ETL run.
//!
//! A run has two stages executed in order. The song stage turns the catalog
//! into the song and artist tables. The log stage turns play events into the
//! user, time and song play tables, joining plays against the song table it
//! reads back from storage. Each table is overwritten as a whole.

mod log_stage;
mod song_stage;
mod stats;

pub use log_stage::LOG_DATA;
pub use song_stage::SONG_DATA;
pub use stats::{LogStageStats, RunSummary, SongStageStats};

use std::sync::Arc;
use std::time::Instant;

use arrow::array::RecordBatch;
use chrono::FixedOffset;
use snafu::ResultExt;
use tracing::info;

use playlake_core::StoragePoolRef;

use crate::config::Config;
use crate::engine::{ArrowEngine, Engine};
use crate::error::{PipelineError, WriteSnafu};
use crate::schema::Table;
use crate::sink::WriteSummary;

/// A configured run over one input root and one output root.
pub struct Pipeline {
    engine: Arc<dyn Engine>,
    config: Config,
    offset: FixedOffset,
}

impl Pipeline {
    /// Validate `config` and bind it to `engine`.
    pub fn new(engine: Arc<dyn Engine>, config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let offset = config.time.offset()?;
        Ok(Self {
            engine,
            config,
            offset,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the song stage, then the log stage.
    ///
    /// A failure aborts the run; tables written before it stay in place.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        info!(
            input = %self.config.input_root,
            output = %self.config.output_root,
            utc_offset = %self.offset,
            "Starting run"
        );

        let song = self.process_song_data().await?;
        let log = self.process_log_data().await?;

        Ok(RunSummary {
            song,
            log,
            duration: start.elapsed(),
        })
    }

    /// Overwrite `table` at its configured location.
    async fn write_table(
        &self,
        table: Table,
        batch: &RecordBatch,
    ) -> Result<WriteSummary, PipelineError> {
        let layout = self.config.layout(table);
        let url = self.config.table_url(&layout);
        self.engine
            .write_partitioned(table.name(), batch, &url, &layout.partition_by)
            .await
            .context(WriteSnafu {
                table: table.name(),
            })
    }
}

/// Run the whole job with the in-process engine.
pub async fn run_pipeline(
    config: Config,
    pool: StoragePoolRef,
) -> Result<RunSummary, PipelineError> {
    let engine = Arc::new(ArrowEngine::new(pool, config.sink.compression));
    Pipeline::new(engine, config)?.run().await
}
