use std::fmt;
use serde::Serialize;
use crate::utils::PipelineError;

/// Position of one step within its run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    /// Algorithm identifier as requested
    pub algorithm: String,
    /// Zero-based position in the algorithm list
    pub index: usize,
    /// Number of algorithms in the run
    pub total: usize,
}

impl StepInfo {
    pub fn new(algorithm: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            algorithm: algorithm.into(),
            index,
            total,
        }
    }
}

/// Lifecycle events emitted by a pipeline run.
///
/// Order per run: `StepStart`/`StepEnd` pairs in list order, `Failed` at most
/// once (right after the first failing step, or in place of the steps when
/// setup fails), `Done` after the last step, `Finish` exactly once and last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    StepStart {
        step: StepInfo,
    },
    #[serde(rename_all = "camelCase")]
    StepEnd {
        step: StepInfo,
        current_size: u64,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        final_size: u64,
    },
    Failed {
        error: PipelineError,
    },
    Finish,
}

impl PipelineEvent {
    /// Short event name, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::StepStart { .. } => "stepStart",
            Self::StepEnd { .. } => "stepEnd",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
            Self::Finish => "finish",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepStart { step } => write!(
                f,
                "[{}/{}] {} started",
                step.index + 1,
                step.total,
                step.algorithm
            ),
            Self::StepEnd { step, current_size } => write!(
                f,
                "[{}/{}] {} finished ({:.2} KB)",
                step.index + 1,
                step.total,
                step.algorithm,
                *current_size as f64 / 1024.0
            ),
            Self::Done { final_size } => {
                write!(f, "done ({:.2} KB)", *final_size as f64 / 1024.0)
            }
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Finish => f.write_str("finish"),
        }
    }
}
