//! Table engine used by the pipeline.

mod arrow_engine;
mod traits;

pub use arrow_engine::ArrowEngine;
pub use traits::Engine;
