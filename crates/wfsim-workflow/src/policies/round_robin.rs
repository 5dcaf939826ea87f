//! Round-robin task eligibility across active jobs.

use std::collections::VecDeque;

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::policy::{Advice, TaskEligibilityPolicy};
use crate::state::{JobId, SchedulerState, TaskId, TaskStatus};

struct QueuedJob {
    job: JobId,
    tasks: VecDeque<TaskId>,
    taken: usize,
}

/// Takes at most `quanta` tasks per cycle, and at most `quanta` tasks of a job before passing the
/// turn to the next job in the queue.
///
/// Jobs enter the queue when they start or when a task of theirs becomes ready again after the job
/// ran out of queued tasks. Only tasks of the job at the head of the queue are admitted.
pub struct RoundRobinEligibility {
    quanta: usize,
    queue: VecDeque<QueuedJob>,
    admitted_in_cycle: usize,
    // admitted tasks that have not been assigned a node yet
    unplaced: Vec<TaskId>,
}

impl RoundRobinEligibility {
    pub fn new(quanta: usize) -> Self {
        Self {
            quanta: quanta.max(1),
            queue: VecDeque::new(),
            admitted_in_cycle: 0,
            unplaced: Vec::new(),
        }
    }

    fn enqueue(&mut self, task: TaskId, front: bool) {
        match self.queue.iter_mut().find(|q| q.job == task.job) {
            Some(queued) => {
                if !queued.tasks.contains(&task) {
                    if front {
                        queued.tasks.push_front(task);
                    } else {
                        queued.tasks.push_back(task);
                    }
                }
            }
            None => self.queue.push_back(QueuedJob {
                job: task.job,
                tasks: VecDeque::from([task]),
                taken: 0,
            }),
        }
    }

    /// Jobs in turn order.
    pub fn queued_jobs(&self) -> Vec<JobId> {
        self.queue.iter().map(|q| q.job).collect()
    }
}

impl SchedulerListener for RoundRobinEligibility {
    fn on_event(&mut self, event: &SchedulerEvent, _state: &SchedulerState) {
        match event {
            SchedulerEvent::JobStarted { job, .. } => {
                if !self.queue.iter().any(|q| q.job == *job) {
                    self.queue.push_back(QueuedJob {
                        job: *job,
                        tasks: VecDeque::new(),
                        taken: 0,
                    });
                }
            }
            SchedulerEvent::TaskReady { task, .. } => self.enqueue(*task, false),
            SchedulerEvent::TaskAssigned { task, .. } => self.unplaced.retain(|t| t != task),
            SchedulerEvent::JobFinished { job, .. } => {
                self.queue.retain(|q| q.job != *job);
                self.unplaced.retain(|t| t.job != *job);
            }
            _ => {}
        }
    }
}

impl TaskEligibilityPolicy for RoundRobinEligibility {
    fn cycle_started(&mut self, state: &SchedulerState) {
        self.admitted_in_cycle = 0;
        // tasks admitted earlier but left without a node get their place back
        let unplaced = std::mem::take(&mut self.unplaced);
        for task in unplaced.into_iter().rev() {
            if state.task(task).map_or(false, |t| t.status == TaskStatus::Ready) {
                self.enqueue(task, true);
            }
        }
        // a job with nothing to run must not hold the turn
        self.queue.retain(|q| !q.tasks.is_empty());
    }

    fn check(&mut self, task: TaskId, _state: &SchedulerState) -> Advice {
        if self.admitted_in_cycle >= self.quanta {
            return Advice::Stop;
        }
        let head = match self.queue.front_mut() {
            Some(head) if head.job == task.job => head,
            _ => return Advice::Deny,
        };
        let pos = match head.tasks.iter().position(|t| *t == task) {
            Some(pos) => pos,
            None => return Advice::Deny,
        };
        head.tasks.remove(pos);
        head.taken += 1;
        if head.tasks.is_empty() {
            self.queue.pop_front();
        } else if head.taken >= self.quanta {
            if let Some(mut head) = self.queue.pop_front() {
                head.taken = 0;
                self.queue.push_back(head);
            }
        }
        self.unplaced.push(task);
        self.admitted_in_cycle += 1;
        Advice::Admit
    }
}
