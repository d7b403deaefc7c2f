//! Core types describing the image under compression and the outcome of a run.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::utils::{PipelineError, PipelineResult, StepError, family_from_extension};

/// The image a pipeline runs against.
///
/// Owned by the caller; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    /// Absolute path to the original file
    pub source_path: PathBuf,
    /// MIME-like media type, e.g. `image/png`
    pub media_type: String,
    /// Size of the original when the run starts
    pub original_size: u64,
}

impl ImageDescriptor {
    pub fn new(source_path: impl Into<PathBuf>, media_type: impl Into<String>, original_size: u64) -> Self {
        Self {
            source_path: source_path.into(),
            media_type: media_type.into(),
            original_size,
        }
    }

    /// Builds a descriptor from a file on disk, inferring the media type from
    /// its extension and measuring its current size.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let source_path = std::path::absolute(path)
            .map_err(|e| PipelineError::setup(format!("Cannot resolve {}: {e}", path.display())))?;
        let family = family_from_extension(&source_path)?;
        let original_size = std::fs::metadata(&source_path)
            .map(|m| m.len())
            .map_err(|e| PipelineError::setup(format!("Cannot read input file: {e}")))?;

        Ok(Self {
            source_path,
            media_type: family.media_type().to_string(),
            original_size,
        })
    }
}

/// Snapshot of a run, suitable for handing to a UI layer.
///
/// A run can be partially successful, so errors travel alongside the savings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Path to the original input file
    pub source_path: PathBuf,
    /// Path to the file the algorithms mutated
    pub working_path: PathBuf,
    /// Original file size in bytes
    pub original_size: u64,
    /// Size of the working file after the last step
    pub final_size: u64,
    /// Bytes saved across all steps
    pub saved_bytes: u64,
    /// Savings as a percentage of the original size
    pub savings: f64,
    /// Algorithms that reduced the size, in run order
    pub completed_algorithms: Vec<String>,
    /// One entry per failed step
    pub errors: Vec<StepError>,
    /// Whether any step (or the setup) failed
    pub failed: bool,
    /// Whether the run reached its terminal state
    pub finished: bool,
}
