//! Stateless policies: null admission and eligibility, submission-time and workload orders,
//! functional filter, first-fit and min-completion-time selection.

use std::cmp::Ordering;

use crate::events::SchedulerListener;
use crate::node::NodeId;
use crate::policy::*;
use crate::state::{JobId, SchedulerState, TaskId};

/// Admits every job.
pub struct NullJobAdmission;

impl SchedulerListener for NullJobAdmission {}

impl JobAdmissionPolicy for NullJobAdmission {
    fn admit(&mut self, _job: JobId, _state: &SchedulerState) -> Advice {
        Advice::Admit
    }
}

/// Earlier submitted jobs first.
pub struct SubmissionTimeJobOrder;

impl SchedulerListener for SubmissionTimeJobOrder {}

impl JobOrderPolicy for SubmissionTimeJobOrder {
    fn compare(&self, a: JobId, b: JobId, state: &SchedulerState) -> Ordering {
        match (state.job(a), state.job(b)) {
            (Some(a), Some(b)) => a.submitted_at.total_cmp(&b.submitted_at),
            _ => Ordering::Equal,
        }
    }
}

/// Every ready task is eligible.
pub struct NullTaskEligibility;

impl SchedulerListener for NullTaskEligibility {}

impl TaskEligibilityPolicy for NullTaskEligibility {
    fn check(&mut self, _task: TaskId, _state: &SchedulerState) -> Advice {
        Advice::Admit
    }
}

/// Tasks of earlier submitted jobs first, readiness order otherwise.
pub struct SubmissionTimeTaskOrder;

impl SchedulerListener for SubmissionTimeTaskOrder {}

impl TaskOrderPolicy for SubmissionTimeTaskOrder {
    fn compare(&self, a: TaskId, b: TaskId, state: &SchedulerState) -> Ordering {
        match (state.job(a.job), state.job(b.job)) {
            (Some(a), Some(b)) => a.submitted_at.total_cmp(&b.submitted_at),
            _ => Ordering::Equal,
        }
    }
}

/// Orders tasks by their amount of computations.
///
/// Smallest first for min-min, largest first for max-min.
pub struct WorkloadTaskOrder {
    descending: bool,
}

impl WorkloadTaskOrder {
    pub fn min() -> Self {
        Self { descending: false }
    }

    pub fn max() -> Self {
        Self { descending: true }
    }
}

impl SchedulerListener for WorkloadTaskOrder {}

impl TaskOrderPolicy for WorkloadTaskOrder {
    fn compare(&self, a: TaskId, b: TaskId, state: &SchedulerState) -> Ordering {
        let (a, b) = match (state.task_spec(a), state.task_spec(b)) {
            (Some(a), Some(b)) => (a.flops, b.flops),
            _ => return Ordering::Equal,
        };
        if self.descending {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }
}

/// Keeps nodes with enough cores and memory for the task.
pub struct FunctionalResourceFilter;

impl SchedulerListener for FunctionalResourceFilter {}

impl ResourceFilterPolicy for FunctionalResourceFilter {
    fn filter(&mut self, nodes: Vec<NodeId>, task: TaskId, state: &SchedulerState) -> Vec<NodeId> {
        let spec = match state.task_spec(task) {
            Some(spec) => spec,
            None => return Vec::new(),
        };
        nodes
            .into_iter()
            .filter(|&id| state.node(id).map_or(false, |node| node.fits(spec)))
            .collect()
    }
}

/// First candidate.
pub struct FirstFitResourceSelection;

impl SchedulerListener for FirstFitResourceSelection {}

impl ResourceSelectionPolicy for FirstFitResourceSelection {
    fn select(&mut self, nodes: &[NodeId], _task: TaskId, _state: &SchedulerState) -> Option<NodeId> {
        nodes.first().copied()
    }
}

/// Candidate on which the task finishes first; the earliest one in the list on ties.
pub struct MinCompletionTimeResourceSelection;

impl SchedulerListener for MinCompletionTimeResourceSelection {}

impl ResourceSelectionPolicy for MinCompletionTimeResourceSelection {
    fn select(&mut self, nodes: &[NodeId], task: TaskId, state: &SchedulerState) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for &node in nodes.iter() {
            let time = match state.runtime(task, node) {
                Some(time) => time,
                None => continue,
            };
            if best.map_or(true, |(_, best_time)| time < best_time) {
                best = Some((node, time));
            }
        }
        best.map(|(node, _)| node)
    }
}
