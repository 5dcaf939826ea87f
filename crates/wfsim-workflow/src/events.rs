//! Lifecycle events published by the scheduler.

use std::fmt;

use serde::Serialize;

use crate::node::NodeId;
use crate::state::{JobId, SchedulerState, TaskId};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    JobSubmitted {
        time: f64,
        job: JobId,
        name: String,
        task_count: usize,
    },
    JobStarted {
        time: f64,
        job: JobId,
    },
    JobFinished {
        time: f64,
        job: JobId,
        submitted_at: f64,
        started_at: f64,
        task_count: usize,
    },
    TaskReady {
        time: f64,
        task: TaskId,
    },
    TaskAssigned {
        time: f64,
        task: TaskId,
        node: NodeId,
    },
    TaskStarted {
        time: f64,
        task: TaskId,
        node: NodeId,
    },
    TaskFinished {
        time: f64,
        task: TaskId,
        node: NodeId,
    },
}

impl SchedulerEvent {
    pub fn time(&self) -> f64 {
        match self {
            SchedulerEvent::JobSubmitted { time, .. }
            | SchedulerEvent::JobStarted { time, .. }
            | SchedulerEvent::JobFinished { time, .. }
            | SchedulerEvent::TaskReady { time, .. }
            | SchedulerEvent::TaskAssigned { time, .. }
            | SchedulerEvent::TaskStarted { time, .. }
            | SchedulerEvent::TaskFinished { time, .. } => *time,
        }
    }
}

impl fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerEvent::JobSubmitted { job, name, task_count, .. } => {
                write!(f, "job {job} ({name}) submitted with {task_count} tasks")
            }
            SchedulerEvent::JobStarted { job, .. } => write!(f, "job {job} started"),
            SchedulerEvent::JobFinished { job, .. } => write!(f, "job {job} finished"),
            SchedulerEvent::TaskReady { task, .. } => write!(f, "task {task} is ready"),
            SchedulerEvent::TaskAssigned { task, node, .. } => write!(f, "task {task} assigned to node {node}"),
            SchedulerEvent::TaskStarted { task, node, .. } => write!(f, "task {task} started on node {node}"),
            SchedulerEvent::TaskFinished { task, node, .. } => write!(f, "task {task} finished on node {node}"),
        }
    }
}

/// Receives scheduler lifecycle events.
///
/// The state passed along is the one right after the transition. On `JobFinished` the job is
/// still present in the state; it is removed right after all listeners are notified.
pub trait SchedulerListener {
    fn on_event(&mut self, _event: &SchedulerEvent, _state: &SchedulerState) {}
}
