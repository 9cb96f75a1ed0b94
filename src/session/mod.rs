//! The pipeline orchestrator: drives the renderer, paces and instruments
//! the frame stream, and feeds the encoder.

mod pipeline;

pub use pipeline::{CancelToken, Pipeline, PipelineOpts, PipelineStats};
