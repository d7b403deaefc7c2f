// src/processing/pipeline.rs

//! Drives one image through its algorithm list.
//!
//! Each step mutates the same working file the next step reads, so steps run
//! strictly one after another inside a single tokio task. The blocking
//! optimizer call itself is pushed onto `spawn_blocking`. A supervising task
//! waits for the run and always emits the terminal `Finish` event, even when
//! the run task dies.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::{ImageDescriptor, PipelineConfig, PipelineEvent, RunState, RunSummary, StepInfo};
use crate::utils::{
    PipelineError, PipelineResult, StepError, create_working_copy, get_file_size,
    scratch_path, validate_descriptor, working_copy_path,
};

use super::engine::{Algorithm, Operation, select_operation};
use super::executor::{NativeRunner, OperationRunner};

const LIBJPEG_HINT: &str = "jpegoptim needs the libjpeg shared library. \
    Install it with your package manager (e.g. `apt install libjpeg-turbo8` or `brew install jpeg`) and retry.";

/// Everything the run task needs, shared with the supervisor.
struct RunContext {
    state: Arc<RwLock<RunState>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    runner: Arc<dyn OperationRunner>,
    image: ImageDescriptor,
    working_path: PathBuf,
    keep_source: bool,
    algorithms: Vec<String>,
    config_error: Option<PipelineError>,
}

impl RunContext {
    fn state(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PipelineEvent) {
        debug!("{}: {}", self.image.source_path.display(), event);
        // A dropped receiver must never affect the run.
        let _ = self.events.send(event);
    }
}

/// One image's compression run.
///
/// Created with [`Pipeline::start`], which begins executing immediately. All
/// observers can be called at any time and return copies of the current
/// state.
pub struct Pipeline {
    state: Arc<RwLock<RunState>>,
    supervisor: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Starts a run against the real optimizer binaries.
    ///
    /// Must be called from within a tokio runtime.
    pub fn native(
        image: ImageDescriptor,
        algorithms: Vec<String>,
        keep_source: bool,
        config: &PipelineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let runner = Arc::new(NativeRunner::new(config));
        Self::start(image, algorithms, keep_source, config, runner)
    }

    /// Starts a run with a custom [`OperationRunner`].
    ///
    /// When `keep_source` is false the algorithms work on a sibling copy of
    /// the source; otherwise on the source itself. A relative source path is
    /// resolved against the current directory. An invalid `config` fails the
    /// run before any step. Must be called from within a tokio runtime.
    pub fn start(
        image: ImageDescriptor,
        algorithms: Vec<String>,
        keep_source: bool,
        config: &PipelineConfig,
        runner: Arc<dyn OperationRunner>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let mut image = image;
        if let Ok(path) = std::path::absolute(&image.source_path) {
            image.source_path = path;
        }
        let working_path = if keep_source {
            image.source_path.clone()
        } else {
            working_copy_path(&image.source_path, &config.working_suffix)
        };

        let state = Arc::new(RwLock::new(RunState::new(
            image.source_path.clone(),
            working_path.clone(),
            algorithms.clone(),
            image.original_size,
        )));
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            "Starting pipeline for {} ({}, {} bytes): [{}]",
            image.source_path.display(),
            image.media_type,
            image.original_size,
            algorithms.join(", ")
        );

        let ctx = Arc::new(RunContext {
            state: state.clone(),
            events: tx,
            runner,
            image,
            working_path,
            keep_source,
            algorithms,
            config_error: config.validate().err(),
        });

        let supervisor = tokio::spawn(supervise(ctx));

        (
            Self {
                state,
                supervisor: Some(supervisor),
            },
            rx,
        )
    }

    fn state(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until the run has finished and returns its summary.
    pub async fn wait(&mut self) -> RunSummary {
        if let Some(handle) = self.supervisor.take() {
            if let Err(e) = handle.await {
                error!("Pipeline supervisor aborted: {e}");
            }
        }
        self.summary()
    }

    pub fn current_size(&self) -> u64 {
        self.state().current_size()
    }

    pub fn original_size(&self) -> u64 {
        self.state().original_size()
    }

    /// Percentage saved so far
    pub fn savings(&self) -> f64 {
        self.state().savings()
    }

    pub fn algorithms(&self) -> Vec<String> {
        self.state().algorithms().to_vec()
    }

    /// Algorithm of the step in flight, if any
    pub fn current_algorithm(&self) -> Option<String> {
        self.state().current_algorithm().map(str::to_string)
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub fn is_failed(&self) -> bool {
        self.state().is_failed()
    }

    pub fn errors(&self) -> Vec<StepError> {
        self.state().errors().to_vec()
    }

    /// Failure that prevented any step from running
    pub fn setup_error(&self) -> Option<PipelineError> {
        self.state().setup_error().cloned()
    }

    pub fn completed_algorithms(&self) -> Vec<String> {
        self.state().completed_algorithms().to_vec()
    }

    pub fn working_path(&self) -> PathBuf {
        self.state().working_path().clone()
    }

    pub fn summary(&self) -> RunSummary {
        self.state().summary()
    }
}

/// Runs the steps, then settles the run no matter how the steps ended.
async fn supervise(ctx: Arc<RunContext>) {
    let run = tokio::spawn(run_steps(ctx.clone()));
    if let Err(e) = run.await {
        error!("Pipeline for {} aborted: {e}", ctx.image.source_path.display());
    }

    let summary = {
        let mut state = ctx.state_mut();
        if !state.finish() {
            return;
        }
        state.summary()
    };

    info!(
        "Pipeline finished for {}: {} -> {} bytes ({:.1}% saved, {} error(s))",
        summary.source_path.display(),
        summary.original_size,
        summary.final_size,
        summary.savings,
        summary.errors.len()
    );
    ctx.emit(PipelineEvent::Finish);
}

async fn run_steps(ctx: Arc<RunContext>) {
    if let Err(err) = prepare_working_file(&ctx).await {
        error!("Cannot prepare {}: {err}", ctx.image.source_path.display());
        ctx.state_mut().record_setup_failure(err.clone());
        ctx.emit(PipelineEvent::Failed { error: err });
        return;
    }

    let total = ctx.algorithms.len();
    for (index, algorithm) in ctx.algorithms.iter().enumerate() {
        let step = StepInfo::new(algorithm.as_str(), index, total);

        let before = {
            let mut state = ctx.state_mut();
            state.begin_step(algorithm);
            state.current_size()
        };
        ctx.emit(PipelineEvent::StepStart { step: step.clone() });

        match execute_step(&ctx, algorithm, before).await {
            Ok(size) => {
                let changed = ctx.state_mut().record_success(algorithm, size);
                if changed {
                    debug!("{algorithm}: {before} -> {size} bytes");
                } else {
                    debug!("{algorithm}: no change ({before} bytes)");
                }
            }
            Err(err) => {
                let err = explain_failure(algorithm, err);
                warn!("{} failed on {}: {err}", algorithm, ctx.working_path.display());
                let first = ctx.state_mut().record_failure(algorithm, &err);
                if first {
                    ctx.emit(PipelineEvent::Failed { error: err });
                }
            }
        }

        let current_size = {
            let mut state = ctx.state_mut();
            state.end_step();
            state.current_size()
        };
        ctx.emit(PipelineEvent::StepEnd { step, current_size });
    }

    let final_size = ctx.state().current_size();
    ctx.emit(PipelineEvent::Done { final_size });
}

async fn prepare_working_file(ctx: &RunContext) -> PipelineResult<()> {
    if let Some(err) = &ctx.config_error {
        return Err(err.clone());
    }
    validate_descriptor(&ctx.image)?;
    if !ctx.keep_source {
        create_working_copy(&ctx.image.source_path, &ctx.working_path).await?;
        debug!("Working copy {} created", ctx.working_path.display());
    }
    Ok(())
}

/// Resolves and runs one algorithm, returning the working file's new size.
async fn execute_step(ctx: &RunContext, algorithm: &str, before: u64) -> PipelineResult<u64> {
    let operation = select_operation(&ctx.image.media_type, algorithm).ok_or_else(|| {
        PipelineError::UnsupportedCombination {
            path: ctx.working_path.clone(),
            media_type: ctx.image.media_type.clone(),
            algorithm: algorithm.to_string(),
        }
    })?;

    let runner = ctx.runner.clone();
    let working_path = ctx.working_path.clone();
    tokio::task::spawn_blocking(move || {
        apply_operation(runner.as_ref(), &operation, &working_path, before)
    })
    .await
    .map_err(|e| PipelineError::operation(algorithm, format!("Task panicked: {e}")))?
}

/// Runs `operation` into a scratch file and moves the result over `working`.
///
/// Output larger than `before` is discarded so the working file never grows.
fn apply_operation(
    runner: &dyn OperationRunner,
    operation: &Operation,
    working: &Path,
    before: u64,
) -> PipelineResult<u64> {
    let scratch = scratch_path(working, operation.algorithm().name());
    let _ = std::fs::remove_file(&scratch);

    let produced = runner
        .run(operation, working, &scratch)
        .and_then(|()| get_file_size(&scratch));

    match produced {
        Ok(size) if size <= before => {
            if let Err(e) = std::fs::rename(&scratch, working) {
                let _ = std::fs::remove_file(&scratch);
                return Err(PipelineError::io(format!(
                    "Cannot replace {}: {e}",
                    working.display()
                )));
            }
            get_file_size(working)
        }
        Ok(size) => {
            debug!(
                "{} produced a larger file ({size} > {before} bytes), discarded",
                operation.algorithm()
            );
            let _ = std::fs::remove_file(&scratch);
            Ok(before)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&scratch);
            Err(e)
        }
    }
}

/// Replaces a jpegoptim failure caused by a missing libjpeg with an install hint.
fn explain_failure(algorithm: &str, error: PipelineError) -> PipelineError {
    if algorithm != Algorithm::Jpegoptim.name() || !is_missing_libjpeg(&error.to_string()) {
        return error;
    }
    PipelineError::MissingDependency {
        algorithm: algorithm.to_string(),
        hint: LIBJPEG_HINT.to_string(),
    }
}

fn is_missing_libjpeg(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("libjpeg")
        && (message.contains("cannot open shared object")
            || message.contains("library not loaded")
            || message.contains("not found"))
}
