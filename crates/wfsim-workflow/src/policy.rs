//! Policy contracts for every stage of a scheduling cycle.
//!
//! All policies are also [listeners](SchedulerListener) and get every lifecycle event before any
//! external listener, which is how stateful policies keep their bookkeeping in sync.

use std::cmp::Ordering;

use crate::events::SchedulerListener;
use crate::node::NodeId;
use crate::state::{JobId, SchedulerState, TaskId};

/// Decision of an admission or eligibility policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advice {
    /// Take the job or task in this cycle.
    Admit,
    /// Skip it in this cycle and look at the next one.
    Deny,
    /// End the phase, nothing else is taken in this cycle.
    Stop,
}

/// Decides whether a queued job becomes active.
pub trait JobAdmissionPolicy: SchedulerListener {
    fn admit(&mut self, job: JobId, state: &SchedulerState) -> Advice;
}

/// Orders the admission queue.
pub trait JobOrderPolicy: SchedulerListener {
    fn compare(&self, a: JobId, b: JobId, state: &SchedulerState) -> Ordering;
}

/// Decides which ready tasks take part in a cycle.
pub trait TaskEligibilityPolicy: SchedulerListener {
    /// Called at the start of each eligibility phase.
    fn cycle_started(&mut self, _state: &SchedulerState) {}

    fn check(&mut self, task: TaskId, state: &SchedulerState) -> Advice;
}

/// Orders the eligible tasks of a cycle. The sort is stable.
pub trait TaskOrderPolicy: SchedulerListener {
    fn compare(&self, a: TaskId, b: TaskId, state: &SchedulerState) -> Ordering;
}

/// Keeps the nodes able to run the task.
pub trait ResourceFilterPolicy: SchedulerListener {
    fn filter(&mut self, nodes: Vec<NodeId>, task: TaskId, state: &SchedulerState) -> Vec<NodeId>;
}

/// Picks a node from the filtered candidates, or none to retry in a later cycle.
///
/// Returning a node outside of `nodes` aborts the run.
pub trait ResourceSelectionPolicy: SchedulerListener {
    fn select(&mut self, nodes: &[NodeId], task: TaskId, state: &SchedulerState) -> Option<NodeId>;
}

/// The six policies driving one scheduler.
pub struct PolicySet {
    pub job_admission: Box<dyn JobAdmissionPolicy>,
    pub job_order: Box<dyn JobOrderPolicy>,
    pub task_eligibility: Box<dyn TaskEligibilityPolicy>,
    pub task_order: Box<dyn TaskOrderPolicy>,
    pub resource_filter: Box<dyn ResourceFilterPolicy>,
    pub resource_selection: Box<dyn ResourceSelectionPolicy>,
}
