use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use saga_core::{DependencyGraph, Saga, StepStatus};

use crate::executor::dispatcher::StepOutput;
use crate::executor::result::StepReport;

#[derive(Debug, Clone)]
pub(crate) struct StepRecord {
    pub status: StepStatus,
    pub action: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Position in the run's completion order, set on forward success.
    pub completed_seq: Option<u64>,
    pub output: Option<StepOutput>,
    pub error: Option<String>,
    pub compensation_error: Option<String>,
}

/// Per-run bookkeeping. Only the scheduler task touches it; workers report
/// back through the join set.
#[derive(Debug)]
pub(crate) struct RunState {
    steps: BTreeMap<String, StepRecord>,
    unmet: BTreeMap<String, usize>,
    completed: u64,
    failed: Vec<String>,
    pub cancelled: bool,
}

impl RunState {
    pub fn new(saga: &Saga, graph: &DependencyGraph) -> Self {
        let steps = saga
            .steps
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    StepRecord {
                        status: StepStatus::Pending,
                        action: s.action.clone(),
                        started_at: None,
                        finished_at: None,
                        completed_seq: None,
                        output: None,
                        error: None,
                        compensation_error: None,
                    },
                )
            })
            .collect();
        let unmet = saga
            .steps
            .iter()
            .map(|s| (s.name.clone(), graph.dependencies(&s.name).len()))
            .collect();
        Self {
            steps,
            unmet,
            completed: 0,
            failed: Vec::new(),
            cancelled: false,
        }
    }

    pub fn initially_ready(&self) -> BTreeSet<String> {
        self.unmet
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn status(&self, step: &str) -> Option<StepStatus> {
        self.steps.get(step).map(|r| r.status)
    }

    pub fn set_status(&mut self, step: &str, status: StepStatus) {
        if let Some(r) = self.steps.get_mut(step) {
            r.status = status;
        }
    }

    pub fn mark_running(&mut self, step: &str) {
        if let Some(r) = self.steps.get_mut(step) {
            r.status = StepStatus::Running;
            r.started_at = Some(Utc::now());
        }
    }

    pub fn record_success(&mut self, step: &str, output: StepOutput) {
        self.completed += 1;
        let seq = self.completed;
        if let Some(r) = self.steps.get_mut(step) {
            r.status = StepStatus::Succeeded;
            r.finished_at = Some(Utc::now());
            r.completed_seq = Some(seq);
            r.output = Some(output);
        }
    }

    pub fn record_failure(&mut self, step: &str, error: String) {
        if let Some(r) = self.steps.get_mut(step) {
            r.status = StepStatus::Failed;
            r.finished_at = Some(Utc::now());
            r.error = Some(error);
        }
        self.failed.push(step.to_string());
    }

    pub fn record_compensation_error(&mut self, step: &str, error: String) {
        if let Some(r) = self.steps.get_mut(step) {
            r.status = StepStatus::CompensationFailed;
            r.compensation_error = Some(error);
        }
    }

    /// Decrements the unmet count of `step`'s dependents and returns those
    /// that just became ready.
    pub fn release_dependents(&mut self, step: &str, graph: &DependencyGraph) -> Vec<String> {
        let mut ready = Vec::new();
        for dependent in graph.dependents_of(step) {
            if let Some(n) = self.unmet.get_mut(dependent) {
                *n = n.saturating_sub(1);
                if *n == 0 && self.status(dependent) == Some(StepStatus::Pending) {
                    ready.push(dependent.clone());
                }
            }
        }
        ready
    }

    pub fn all_succeeded(&self) -> bool {
        self.steps.values().all(|r| r.status == StepStatus::Succeeded)
    }

    /// Forward-succeeded steps, most recently completed first.
    pub fn succeeded_in_reverse_completion(&self) -> Vec<String> {
        let mut done: Vec<(u64, &String)> = self
            .steps
            .iter()
            .filter(|(_, r)| r.status == StepStatus::Succeeded)
            .filter_map(|(name, r)| r.completed_seq.map(|seq| (seq, name)))
            .collect();
        done.sort_by(|a, b| b.0.cmp(&a.0));
        done.into_iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn running(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|(_, r)| r.status == StepStatus::Running)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn error(&self, step: &str) -> Option<&str> {
        self.steps.get(step).and_then(|r| r.error.as_deref())
    }

    pub fn step_reports(&self) -> BTreeMap<String, StepReport> {
        self.steps
            .iter()
            .map(|(name, r)| {
                (
                    name.clone(),
                    StepReport {
                        status: r.status,
                        action: r.action.clone(),
                        started_at: r.started_at,
                        finished_at: r.finished_at,
                        output: r.output.clone(),
                        error: r.error.clone(),
                        compensation_error: r.compensation_error.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::{build_dependency_graph, Step};
    use serde_json::json;

    fn chain() -> (Saga, DependencyGraph) {
        let saga = Saga::new("chain")
            .with_step(Step::new("a", "do_a"))
            .with_step(Step::new("b", "do_b").requires("a"))
            .with_step(Step::new("c", "do_c"));
        let graph = build_dependency_graph(&saga).unwrap();
        (saga, graph)
    }

    #[test]
    fn dependents_become_ready_after_success() {
        let (saga, graph) = chain();
        let mut state = RunState::new(&saga, &graph);
        let ready: Vec<_> = state.initially_ready().into_iter().collect();
        assert_eq!(ready, vec!["a", "c"]);

        state.mark_running("a");
        state.record_success("a", json!(null));
        assert_eq!(state.release_dependents("a", &graph), vec!["b".to_string()]);
    }

    #[test]
    fn reverse_completion_order_follows_sequence() {
        let (saga, graph) = chain();
        let mut state = RunState::new(&saga, &graph);
        state.record_success("c", json!(1));
        state.record_success("a", json!(2));
        state.record_failure("b", "boom".into());

        assert_eq!(state.succeeded_in_reverse_completion(), vec!["a", "c"]);
        assert_eq!(state.failed(), &["b".to_string()]);
        assert!(!state.all_succeeded());
        assert_eq!(state.error("b"), Some("boom"));
    }
}
