//! Mutable state of one pipeline run.
//!
//! Failure is accumulated here rather than propagated: `failed` and
//! `finished` are sticky, and once `finished` is set every mutator becomes a
//! no-op.

use std::path::PathBuf;
use tracing::warn;
use crate::core::RunSummary;
use crate::utils::{PipelineError, StepError};

#[derive(Debug, Clone)]
pub struct RunState {
    source_path: PathBuf,
    working_path: PathBuf,
    algorithms: Vec<String>,
    original_size: u64,
    current_size: u64,
    current_algorithm: Option<String>,
    completed_algorithms: Vec<String>,
    errors: Vec<StepError>,
    setup_error: Option<PipelineError>,
    failed: bool,
    finished: bool,
}

impl RunState {
    pub fn new(
        source_path: PathBuf,
        working_path: PathBuf,
        algorithms: Vec<String>,
        original_size: u64,
    ) -> Self {
        Self {
            source_path,
            working_path,
            algorithms,
            original_size,
            current_size: original_size,
            current_algorithm: None,
            completed_algorithms: Vec::new(),
            errors: Vec::new(),
            setup_error: None,
            failed: false,
            finished: false,
        }
    }

    pub fn begin_step(&mut self, algorithm: &str) {
        if self.guard_finished("begin_step") {
            return;
        }
        self.current_algorithm = Some(algorithm.to_string());
    }

    /// Records a successful step that left the working file at `new_size`.
    ///
    /// Returns `true` when the size changed and the algorithm was recorded as
    /// completed. A size above the current one is ignored.
    pub fn record_success(&mut self, algorithm: &str, new_size: u64) -> bool {
        if self.guard_finished("record_success") {
            return false;
        }
        if new_size > self.current_size {
            warn!(
                "{} reported growth ({} -> {} bytes), keeping previous size",
                algorithm, self.current_size, new_size
            );
            return false;
        }
        let changed = new_size != self.current_size;
        if changed {
            self.completed_algorithms.push(algorithm.to_string());
        }
        self.current_size = new_size;
        changed
    }

    /// Records a failed step. Returns `true` if this is the run's first failure.
    pub fn record_failure(&mut self, algorithm: &str, error: &PipelineError) -> bool {
        if self.guard_finished("record_failure") {
            return false;
        }
        let first = !self.failed;
        self.errors.push(StepError::new(algorithm, error));
        self.failed = true;
        first
    }

    /// Records a failure that happened before any step could run.
    pub fn record_setup_failure(&mut self, error: PipelineError) {
        if self.guard_finished("record_setup_failure") {
            return;
        }
        self.setup_error = Some(error);
        self.failed = true;
    }

    pub fn end_step(&mut self) {
        if self.guard_finished("end_step") {
            return;
        }
        self.current_algorithm = None;
    }

    /// Marks the run finished. Returns `false` if it already was.
    pub fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.current_algorithm = None;
        self.finished = true;
        true
    }

    fn guard_finished(&self, op: &str) -> bool {
        if self.finished {
            warn!("Ignoring {} on a finished run", op);
        }
        self.finished
    }

    pub fn source_path(&self) -> &PathBuf {
        &self.source_path
    }

    pub fn working_path(&self) -> &PathBuf {
        &self.working_path
    }

    pub fn algorithms(&self) -> &[String] {
        &self.algorithms
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn current_algorithm(&self) -> Option<&str> {
        self.current_algorithm.as_deref()
    }

    pub fn completed_algorithms(&self) -> &[String] {
        &self.completed_algorithms
    }

    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    pub fn setup_error(&self) -> Option<&PipelineError> {
        self.setup_error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Percentage saved relative to the original size
    pub fn savings(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        100.0 * (1.0 - self.current_size as f64 / self.original_size as f64)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            source_path: self.source_path.clone(),
            working_path: self.working_path.clone(),
            original_size: self.original_size,
            final_size: self.current_size,
            saved_bytes: self.original_size.saturating_sub(self.current_size),
            savings: self.savings(),
            completed_algorithms: self.completed_algorithms.clone(),
            errors: self.errors.clone(),
            failed: self.failed,
            finished: self.finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(algorithms: &[&str], size: u64) -> RunState {
        RunState::new(
            PathBuf::from("/img/a.png"),
            PathBuf::from("/img/a.min.png"),
            algorithms.iter().map(|a| a.to_string()).collect(),
            size,
        )
    }

    #[test]
    fn mixed_run() {
        let mut s = state(&["A", "B", "C"], 1000);

        s.begin_step("A");
        assert_eq!(s.current_algorithm(), Some("A"));
        assert!(s.record_failure("A", &PipelineError::operation("A", "boom")));
        s.end_step();

        s.begin_step("B");
        assert!(s.record_success("B", 800));
        s.end_step();

        s.begin_step("C");
        assert!(!s.record_success("C", 800));
        s.end_step();

        assert!(s.finish());
        assert_eq!(s.current_size(), 800);
        assert_eq!(s.completed_algorithms(), ["B".to_string()]);
        assert_eq!(s.errors().len(), 1);
        assert_eq!(s.errors()[0].algorithm, "A");
        assert!(s.is_failed());
        assert!(s.is_finished());
        assert_eq!(s.current_algorithm(), None);
        assert!((s.savings() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn only_first_failure_is_reported_as_first() {
        let mut s = state(&["A", "B"], 10);
        let err = PipelineError::operation("x", "y");
        assert!(s.record_failure("A", &err));
        assert!(!s.record_failure("B", &err));
        assert_eq!(s.errors().len(), 2);
    }

    #[test]
    fn growth_is_ignored() {
        let mut s = state(&["A"], 500);
        assert!(!s.record_success("A", 600));
        assert_eq!(s.current_size(), 500);
        assert!(s.completed_algorithms().is_empty());
    }

    #[test]
    fn finished_run_is_frozen() {
        let mut s = state(&["A"], 500);
        assert!(s.finish());
        assert!(!s.finish());
        s.begin_step("A");
        assert!(!s.record_success("A", 100));
        assert!(!s.record_failure("A", &PipelineError::io("late")));
        assert_eq!(s.current_size(), 500);
        assert_eq!(s.current_algorithm(), None);
        assert!(!s.is_failed());
    }

    #[test]
    fn zero_sized_original_has_no_savings() {
        let s = state(&[], 0);
        assert_eq!(s.savings(), 0.0);
    }

    #[test]
    fn setup_failure_marks_failed_without_step_errors() {
        let mut s = state(&["A"], 10);
        s.record_setup_failure(PipelineError::setup("copy failed"));
        assert!(s.is_failed());
        assert!(s.errors().is_empty());
        assert!(s.setup_error().is_some());
    }

    #[derive(Debug, Clone)]
    enum Outcome {
        Fail,
        Resize(u64),
    }

    fn outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![Just(Outcome::Fail), (0u64..2000).prop_map(Outcome::Resize)]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_outcomes(original in 0u64..2000, outcomes in prop::collection::vec(outcome(), 0..12)) {
            let names: Vec<String> = (0..outcomes.len()).map(|i| format!("algo{i}")).collect();
            let mut s = RunState::new(
                PathBuf::from("/x.png"),
                PathBuf::from("/x.min.png"),
                names.clone(),
                original,
            );

            for (name, outcome) in names.iter().zip(&outcomes) {
                let before = s.current_size();
                s.begin_step(name);
                match outcome {
                    Outcome::Fail => {
                        s.record_failure(name, &PipelineError::operation(name.as_str(), "x"));
                        prop_assert_eq!(s.current_size(), before);
                    }
                    Outcome::Resize(size) => {
                        s.record_success(name, *size);
                    }
                }
                s.end_step();
                prop_assert!(s.current_size() <= s.original_size());
                prop_assert!(s.current_size() <= before);
            }
            s.finish();

            prop_assert!(s.errors().len() <= s.algorithms().len());
            // completed is an order-preserving subsequence of algorithms
            let mut it = s.algorithms().iter();
            for done in s.completed_algorithms() {
                prop_assert!(it.any(|a| a == done));
            }
            let all_failed = outcomes.iter().all(|o| matches!(o, Outcome::Fail));
            if all_failed {
                prop_assert_eq!(s.current_size(), original);
                prop_assert_eq!(s.errors().len(), outcomes.len());
                prop_assert!(s.completed_algorithms().is_empty());
            }
            if s.current_size() == original {
                prop_assert_eq!(s.savings(), 0.0);
            }
        }
    }
}
