// src/processing/executor.rs

//! Runs optimizer operations as blocking external processes.
//!
//! The pipeline calls [`OperationRunner::run`] from tokio's blocking pool, one
//! step at a time. [`NativeRunner`] spawns the optimizer binary with the
//! image's directory as its working directory and kills it when the step
//! timeout expires.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::PipelineConfig;
use crate::utils::{PipelineError, PipelineResult, parent_dir};

use super::engine::{Invocation, Operation};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Executes one resolved operation.
///
/// Implementations must leave the compressed result at `output` and return
/// `Ok`, or return an error and make no promise about `output`. `input` must
/// never be modified.
pub trait OperationRunner: Send + Sync {
    fn run(&self, operation: &Operation, input: &Path, output: &Path) -> PipelineResult<()>;
}

/// Runs the real optimizer binaries.
#[derive(Debug, Clone)]
pub struct NativeRunner {
    tool_dir: Option<PathBuf>,
    timeout: Duration,
}

impl NativeRunner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            tool_dir: config.tool_dir.clone(),
            timeout: config.step_timeout(),
        }
    }

    fn program_path(&self, operation: &Operation) -> PathBuf {
        match &self.tool_dir {
            Some(dir) => dir.join(operation.program()),
            None => PathBuf::from(operation.program()),
        }
    }

    /// Whether the binary behind `operation` can be started at all.
    pub fn is_available(&self, operation: &Operation) -> bool {
        let program = self.program_path(operation);
        if program.components().count() > 1 {
            return program.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&program).is_file()))
            .unwrap_or(false)
    }
}

impl OperationRunner for NativeRunner {
    fn run(&self, operation: &Operation, input: &Path, output: &Path) -> PipelineResult<()> {
        let algorithm = operation.algorithm().name();

        // The child runs in the image's directory, so relative paths would
        // resolve twice.
        let input = absolute_path(input)?;
        let output = absolute_path(output)?;

        if operation.invocation() == Invocation::InPlace {
            stage_copy(&input, &output, algorithm)?;
        }

        let program = self.program_path(operation);
        debug!("Running {}", operation.command_line(&input, &output));

        let mut child = Command::new(&program)
            .args(operation.args(&input, &output))
            .current_dir(parent_dir(&input))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PipelineError::operation(
                    algorithm,
                    format!("failed to start {}: {e}", program.display()),
                )
            })?;

        // Drain stderr on its own thread so a chatty tool cannot block on a full pipe.
        let (stderr_tx, stderr_rx) = mpsc::channel();
        if let Some(mut stderr) = child.stderr.take() {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                let _ = stderr_tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }

        let status = wait_with_timeout(&mut child, self.timeout).map_err(|e| {
            PipelineError::operation(algorithm, format!("failed waiting for process: {e}"))
        })?;

        // A leftover grandchild can hold the pipe open; never wait on it for long.
        let stderr = stderr_rx.recv_timeout(STDERR_GRACE).unwrap_or_default();

        match status {
            Some(status) if status.success() => {
                if !output.is_file() {
                    return Err(PipelineError::operation(
                        algorithm,
                        "exited successfully but produced no output",
                    ));
                }
                Ok(())
            }
            Some(status)
                if status
                    .code()
                    .is_some_and(|code| operation.no_gain_exit_codes().contains(&code)) =>
            {
                debug!("{algorithm} could not shrink {}", input.display());
                stage_copy(&input, &output, algorithm)
            }
            Some(status) => Err(PipelineError::operation(
                algorithm,
                failure_message(status, &stderr),
            )),
            None => {
                warn!("{} exceeded {:?}, killed", algorithm, self.timeout);
                Err(PipelineError::Timeout {
                    algorithm: algorithm.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

fn absolute_path(path: &Path) -> PipelineResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| PipelineError::io(format!("Cannot resolve {}: {e}", path.display())))
}

/// Puts an unmodified copy of `input` at `output`.
fn stage_copy(input: &Path, output: &Path, algorithm: &str) -> PipelineResult<()> {
    std::fs::copy(input, output).map(|_| ()).map_err(|e| {
        PipelineError::io(format!("Cannot stage {} for {algorithm}: {e}", input.display()))
    })
}

/// Waits for `child` until `timeout`; kills it and returns `None` on expiry.
fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {status}")
    } else {
        format!("exited with {status}: {stderr}")
    }
}
