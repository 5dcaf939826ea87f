//! Run metrics collected from scheduler events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::state::{SchedulerState, TaskId};

/// Contains metrics collected from a simulation run.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct RunStats {
    pub jobs_submitted: usize,
    pub jobs_finished: usize,
    pub tasks_finished: usize,
    /// Time from the first job submission to the last job completion (in seconds).
    pub makespan: f64,
    /// Mean time from job submission to job completion.
    pub mean_turnaround: f64,
    pub max_turnaround: f64,
    /// Mean time from job submission to job admission.
    pub mean_waiting_time: f64,
    /// Mean time from job admission to job completion.
    pub mean_job_makespan: f64,
    /// Finished tasks per second of makespan.
    pub throughput: f64,
    /// Ratio of node-seconds spent running tasks to all node-seconds of the makespan.
    pub utilization: f64,
    /// Total node-seconds of the makespan spent without a task.
    pub idle_time: f64,
}

/// Listener computing [`RunStats`].
pub struct RunMonitor {
    node_count: usize,
    first_submit: Option<f64>,
    last_finish: f64,
    jobs_submitted: usize,
    jobs_finished: usize,
    tasks_finished: usize,
    total_turnaround: f64,
    max_turnaround: f64,
    total_waiting: f64,
    total_job_makespan: f64,
    busy_time: f64,
    task_starts: HashMap<TaskId, f64>,
}

impl RunMonitor {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            first_submit: None,
            last_finish: 0.,
            jobs_submitted: 0,
            jobs_finished: 0,
            tasks_finished: 0,
            total_turnaround: 0.,
            max_turnaround: 0.,
            total_waiting: 0.,
            total_job_makespan: 0.,
            busy_time: 0.,
            task_starts: HashMap::new(),
        }
    }

    pub fn stats(&self) -> RunStats {
        let makespan = self.first_submit.map_or(0., |start| (self.last_finish - start).max(0.));
        let mean = |total: f64| {
            if self.jobs_finished > 0 {
                total / self.jobs_finished as f64
            } else {
                0.
            }
        };
        let capacity = makespan * self.node_count as f64;
        RunStats {
            jobs_submitted: self.jobs_submitted,
            jobs_finished: self.jobs_finished,
            tasks_finished: self.tasks_finished,
            makespan,
            mean_turnaround: mean(self.total_turnaround),
            max_turnaround: self.max_turnaround,
            mean_waiting_time: mean(self.total_waiting),
            mean_job_makespan: mean(self.total_job_makespan),
            throughput: if makespan > 0. {
                self.tasks_finished as f64 / makespan
            } else {
                0.
            },
            utilization: if capacity > 0. { self.busy_time / capacity } else { 0. },
            idle_time: (capacity - self.busy_time).max(0.),
        }
    }
}

impl SchedulerListener for RunMonitor {
    fn on_event(&mut self, event: &SchedulerEvent, _state: &SchedulerState) {
        match *event {
            SchedulerEvent::JobSubmitted { time, .. } => {
                self.jobs_submitted += 1;
                self.first_submit.get_or_insert(time);
            }
            SchedulerEvent::JobFinished {
                time,
                submitted_at,
                started_at,
                ..
            } => {
                self.jobs_finished += 1;
                let turnaround = time - submitted_at;
                self.total_turnaround += turnaround;
                self.max_turnaround = self.max_turnaround.max(turnaround);
                self.total_waiting += started_at - submitted_at;
                self.total_job_makespan += time - started_at;
                self.last_finish = self.last_finish.max(time);
            }
            SchedulerEvent::TaskStarted { time, task, .. } => {
                self.task_starts.insert(task, time);
            }
            SchedulerEvent::TaskFinished { time, task, .. } => {
                if let Some(start) = self.task_starts.remove(&task) {
                    self.busy_time += time - start;
                    self.tasks_finished += 1;
                }
            }
            _ => {}
        }
    }
}
