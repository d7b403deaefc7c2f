// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod processing;

// Public exports for external consumers
pub use crate::core::{ImageDescriptor, PipelineConfig, PipelineEvent, RunSummary, StepInfo};
pub use crate::processing::{
    Algorithm, NativeRunner, Operation, OperationRunner, Pipeline, family_algorithms,
    select_operation,
};
pub use crate::utils::{MediaFamily, PipelineError, PipelineResult, StepError};
