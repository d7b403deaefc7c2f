//! Core pipeline types and state.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`ImageDescriptor`]: The image a run compresses
//! - [`RunState`]: Mutable state of one run, with sticky failure flags
//! - [`PipelineEvent`]: Lifecycle events emitted while a run progresses
//! - [`PipelineConfig`]: Timeouts and tool lookup settings
//! - [`RunSummary`]: Serializable outcome of a run

mod config;
mod progress;
mod state;
mod types;

pub use config::PipelineConfig;
pub use progress::{PipelineEvent, StepInfo};
pub use state::RunState;
pub use types::{ImageDescriptor, RunSummary};
