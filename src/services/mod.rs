//! Services
//!
//! Simulation business logic. The pipeline is the only service; storage and
//! configuration live in `storage`.

pub mod pipeline;

pub use pipeline::{FanOutExecutor, PipelineController, RunResult};
