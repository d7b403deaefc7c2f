//! Error types for the compression pipeline.
//!
//! Step-level failures never abort a run: they are converted into
//! [`StepError`] records and kept on the run state. [`PipelineError`] is the
//! typed cause behind each record and the payload of the `Failed` event.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use serde::Serialize;

/// Main error type for the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum PipelineError {
    /// The media type / algorithm pair has no operation
    #[error("Invalid file/algorithm combination: {algorithm} cannot process {} ({media_type})", .path.display())]
    UnsupportedCombination {
        path: PathBuf,
        media_type: String,
        algorithm: String,
    },

    /// The external optimizer failed to start or exited unsuccessfully
    #[error("{algorithm} failed: {message}")]
    Operation { algorithm: String, message: String },

    /// The optimizer is installed but a native library it links against is not
    #[error("{algorithm} is missing a native dependency: {hint}")]
    MissingDependency { algorithm: String, hint: String },

    /// The optimizer ran past the configured step timeout and was killed
    #[error("{algorithm} timed out after {seconds}s")]
    Timeout { algorithm: String, seconds: u64 },

    /// File IO error around a step (size measurement, scratch file handling)
    #[error("IO error: {0}")]
    Io(String),

    /// The run could not be prepared (source missing, working copy failed)
    #[error("Setup error: {0}")]
    Setup(String),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn operation(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::Io(msg.into())
    }

    pub fn setup<T: Into<String>>(msg: T) -> Self {
        Self::Setup(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// One failed step as recorded on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    /// Algorithm identifier as requested by the caller
    pub algorithm: String,
    /// Human readable failure description
    pub message: String,
}

impl StepError {
    pub fn new(algorithm: impl Into<String>, error: &PipelineError) -> Self {
        Self {
            algorithm: algorithm.into(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_combination_names_file_and_algorithm() {
        let err = PipelineError::UnsupportedCombination {
            path: PathBuf::from("/tmp/cat.gif"),
            media_type: "image/gif".to_string(),
            algorithm: "optipng".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("optipng"));
        assert!(msg.contains("/tmp/cat.gif"));
    }

    #[test]
    fn io_errors_convert() {
        let err: PipelineError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PipelineError::Io(ref m) if m.contains("gone")));
    }

    #[test]
    fn step_error_keeps_requested_name() {
        let err = PipelineError::operation("pngout", "exit status 2");
        let step = StepError::new("pngout", &err);
        assert_eq!(step.algorithm, "pngout");
        assert_eq!(step.message, "pngout failed: exit status 2");
    }
}
