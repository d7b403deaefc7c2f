use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::utils::{PipelineError, PipelineResult};

/// Runtime configuration shared by every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Seconds one optimizer process may run before it is killed
    pub step_timeout_secs: u64,
    /// Directory holding the optimizer binaries; `PATH` lookup when unset
    pub tool_dir: Option<PathBuf>,
    /// Infix for the working copy, `cat.jpg` -> `cat.<suffix>.jpg`
    pub working_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 120,
            tool_dir: None,
            working_suffix: "min".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.step_timeout_secs == 0 {
            return Err(PipelineError::config("stepTimeoutSecs cannot be 0"));
        }
        if self.working_suffix.is_empty() || self.working_suffix.contains(['/', '\\']) {
            return Err(PipelineError::config(format!(
                "Invalid working suffix: {:?}", self.working_suffix
            )));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = PipelineConfig::from_json(r#"{ "stepTimeoutSecs": 30 }"#).unwrap();
        assert_eq!(config.step_timeout(), Duration::from_secs(30));
        assert_eq!(config.working_suffix, "min");
        assert_eq!(config.tool_dir, None);
    }

    #[test]
    fn tool_dir_is_read() {
        let config = PipelineConfig::from_json(r#"{ "toolDir": "/opt/optimizers/bin" }"#).unwrap();
        assert_eq!(config.tool_dir, Some(PathBuf::from("/opt/optimizers/bin")));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = PipelineConfig::from_json(r#"{ "stepTimeoutSecs": 0 }"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rejects_suffix_with_separator() {
        assert!(PipelineConfig::from_json(r#"{ "workingSuffix": "../x" }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "workingSuffix": "" }"#).is_err());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PipelineConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
