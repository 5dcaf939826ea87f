//! Workflow scheduler: the scheduling loop and the job/task lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use wfsim_core::cast;
use wfsim_core::context::SimulationContext;
use wfsim_core::event::Event;
use wfsim_core::handler::EventHandler;
use wfsim_core::{log_debug, log_error, log_info, log_trace, log_warn};

use crate::config::SchedulerMode;
use crate::error::SchedulerError;
use crate::events::{SchedulerEvent, SchedulerListener};
use crate::job::Job;
use crate::node::{NodeId, ResourcePool};
use crate::policy::{Advice, PolicySet};
use crate::state::{JobId, JobStatus, SchedulerState, TaskId, TaskStatus};

#[derive(Clone, Serialize)]
pub struct JobArrival {
    pub job: Job,
}

#[derive(Clone, Serialize)]
pub struct ScheduleCycle {}

#[derive(Clone, Serialize)]
pub struct TaskCompleted {
    pub task: TaskId,
}

/// Schedules jobs on a pool of nodes in discrete cycles.
///
/// A cycle admits queued jobs, selects eligible ready tasks, orders them and places each on a node,
/// then starts the placed tasks. Every stage is delegated to a policy of the [`PolicySet`]. Cycles
/// are requested on job arrival, on task completion, and after a cycle that made progress while work
/// is left; at most one cycle is pending at a time.
///
/// A broken invariant aborts the scheduler: the error is logged, pending events of the scheduler
/// are cancelled and further events are ignored.
pub struct WorkflowScheduler {
    state: SchedulerState,
    policies: PolicySet,
    listeners: Vec<Rc<RefCell<dyn SchedulerListener>>>,
    mode: SchedulerMode,
    cycle_pending: bool,
    cycle_count: u64,
    error: Option<SchedulerError>,
    ctx: SimulationContext,
}

impl WorkflowScheduler {
    pub fn new(pool: ResourcePool, policies: PolicySet, mode: SchedulerMode, ctx: SimulationContext) -> Self {
        Self {
            state: SchedulerState::new(pool),
            policies,
            listeners: Vec::new(),
            mode,
            cycle_pending: false,
            cycle_count: 0,
            error: None,
            ctx,
        }
    }

    /// Registers a listener notified of every lifecycle event after the policies.
    pub fn add_listener(&mut self, listener: Rc<RefCell<dyn SchedulerListener>>) {
        self.listeners.push(listener);
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&SchedulerError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<SchedulerError> {
        self.error.take()
    }

    fn publish(&mut self, event: SchedulerEvent) {
        log_debug!(self.ctx, "{}", event);
        let state = &self.state;
        let policies = &mut self.policies;
        policies.job_admission.on_event(&event, state);
        policies.job_order.on_event(&event, state);
        policies.task_eligibility.on_event(&event, state);
        policies.task_order.on_event(&event, state);
        policies.resource_filter.on_event(&event, state);
        policies.resource_selection.on_event(&event, state);
        for listener in self.listeners.iter() {
            listener.borrow_mut().on_event(&event, state);
        }
    }

    fn violation(&self, reason: String) -> SchedulerError {
        SchedulerError::InvariantViolation {
            reason,
            dump: self.state.dump(),
        }
    }

    fn abort(&mut self, error: SchedulerError) {
        log_error!(self.ctx, "aborting: {}", error);
        self.ctx.cancel_own_events();
        self.error = Some(error);
    }

    fn request_cycle(&mut self) {
        if self.cycle_pending {
            return;
        }
        let delay = match self.mode {
            SchedulerMode::Interactive => 0.,
            SchedulerMode::Batch { quantum } => quantum - self.ctx.time() % quantum,
        };
        self.cycle_pending = true;
        self.ctx.emit_self(ScheduleCycle {}, delay);
    }

    fn submit(&mut self, job: Job) {
        self.state.time = self.ctx.time();
        let name = job.name.clone();
        let task_count = job.len();
        let id = self.state.insert_job(Rc::new(job));
        log_info!(self.ctx, "job {} ({}) submitted with {} tasks", id, name, task_count);
        self.publish(SchedulerEvent::JobSubmitted {
            time: self.state.time,
            job: id,
            name,
            task_count,
        });
        if task_count == 0 {
            self.state.queue.retain(|&j| j != id);
            self.activate_job(id);
            self.finish_job(id);
        } else {
            self.request_cycle();
        }
    }

    fn activate_job(&mut self, id: JobId) {
        let time = self.state.time;
        let roots = match self.state.jobs.get_mut(&id) {
            Some(job) => {
                job.status = JobStatus::Active;
                job.started_at = Some(time);
                job.job.roots().collect::<Vec<_>>()
            }
            None => return,
        };
        self.publish(SchedulerEvent::JobStarted { time, job: id });
        for index in roots.into_iter() {
            self.make_ready(TaskId::new(id, index));
        }
    }

    fn make_ready(&mut self, task: TaskId) {
        let time = self.state.time;
        if let Some(state) = self.state.task_mut(task) {
            state.status = TaskStatus::Ready;
            state.ready_at = Some(time);
            self.state.ready.insert(task);
            self.publish(SchedulerEvent::TaskReady { time, task });
        }
    }

    fn finish_job(&mut self, id: JobId) {
        let time = self.state.time;
        let (submitted_at, started_at, task_count) = match self.state.jobs.get_mut(&id) {
            Some(job) => {
                job.status = JobStatus::Finished;
                job.finished_at = Some(time);
                (job.submitted_at, job.started_at.unwrap_or(time), job.tasks.len())
            }
            None => return,
        };
        log_info!(self.ctx, "job {} finished", id);
        self.publish(SchedulerEvent::JobFinished {
            time,
            job: id,
            submitted_at,
            started_at,
            task_count,
        });
        self.state.jobs.remove(&id);
    }

    fn run_cycle(&mut self) -> Result<(), SchedulerError> {
        self.cycle_pending = false;
        self.cycle_count += 1;
        self.state.time = self.ctx.time();
        let mut progress = false;

        // admission
        let mut queue = std::mem::take(&mut self.state.queue);
        queue.sort_by(|&a, &b| self.policies.job_order.compare(a, b, &self.state));
        self.state.queue = queue;
        let mut i = 0;
        while i < self.state.queue.len() {
            let job = self.state.queue[i];
            match self.policies.job_admission.admit(job, &self.state) {
                Advice::Admit => {
                    self.state.queue.remove(i);
                    self.activate_job(job);
                    progress = true;
                }
                Advice::Deny => i += 1,
                Advice::Stop => break,
            }
        }

        // eligibility
        self.policies.task_eligibility.cycle_started(&self.state);
        let mut candidates = Vec::new();
        for task in self.state.ready_tasks().collect::<Vec<_>>().into_iter() {
            match self.policies.task_eligibility.check(task, &self.state) {
                Advice::Admit => candidates.push(task),
                Advice::Deny => {}
                Advice::Stop => break,
            }
        }

        // ordering
        candidates.sort_by(|&a, &b| self.policies.task_order.compare(a, b, &self.state));

        // placement
        let mut assigned = Vec::new();
        for task in candidates.into_iter() {
            let available = self.state.pool.available_nodes();
            if available.is_empty() {
                break;
            }
            let nodes = self.policies.resource_filter.filter(available, task, &self.state);
            if nodes.is_empty() {
                continue;
            }
            let node = match self.policies.resource_selection.select(&nodes, task, &self.state) {
                Some(node) => node,
                None => continue,
            };
            if !nodes.contains(&node) {
                return Err(self.violation(format!(
                    "node {} selected for task {} is not among the candidates",
                    node, task
                )));
            }
            if let Err(e) = self.state.pool.reserve(node) {
                return Err(self.violation(format!("can't reserve node for task {}: {}", task, e)));
            }
            if let Some(state) = self.state.task_mut(task) {
                state.status = TaskStatus::Assigned;
                state.node = Some(node);
            }
            self.state.ready.shift_remove(&task);
            self.publish(SchedulerEvent::TaskAssigned {
                time: self.state.time,
                task,
                node,
            });
            assigned.push((task, node));
            progress = true;
        }

        // commit
        for (task, node) in assigned.into_iter() {
            self.start_task(task, node)?;
        }

        log_trace!(
            self.ctx,
            "cycle {} done: {} queued jobs, {} ready tasks, {} free nodes",
            self.cycle_count,
            self.state.queue.len(),
            self.state.ready.len(),
            self.state.pool.available_count()
        );
        if progress && self.state.has_pending_work() {
            self.request_cycle();
        }
        Ok(())
    }

    fn start_task(&mut self, task: TaskId, node: NodeId) -> Result<(), SchedulerError> {
        let unmet = self.state.job(task.job).and_then(|job| {
            job.dependencies(task.index)
                .find(|&dep| self.state.task(dep).map_or(true, |t| t.status != TaskStatus::Finished))
        });
        if let Some(dep) = unmet {
            return Err(self.violation(format!(
                "task {} is started before its dependency {} is finished",
                task, dep
            )));
        }
        let runtime = match self.state.runtime(task, node) {
            Some(runtime) => runtime,
            None => return Err(self.violation(format!("task {} or node {} does not exist", task, node))),
        };
        let time = self.state.time;
        if let Some(state) = self.state.task_mut(task) {
            state.status = TaskStatus::Running;
            state.started_at = Some(time);
        }
        self.publish(SchedulerEvent::TaskStarted { time, task, node });
        self.ctx.emit_self(TaskCompleted { task }, runtime);
        Ok(())
    }

    fn on_task_completed(&mut self, task: TaskId) -> Result<(), SchedulerError> {
        self.state.time = self.ctx.time();
        let time = self.state.time;
        let node = match self.state.task_mut(task) {
            Some(state) if state.status == TaskStatus::Running => {
                state.status = TaskStatus::Finished;
                state.finished_at = Some(time);
                state.node
            }
            _ => {
                log_warn!(self.ctx, "ignoring completion of task {} which is not running", task);
                return Ok(());
            }
        };
        let node = match node {
            Some(node) => node,
            None => return Err(self.violation(format!("running task {} has no node", task))),
        };
        if let Err(e) = self.state.pool.release(node) {
            return Err(self.violation(format!("can't release node of task {}: {}", task, e)));
        }
        self.publish(SchedulerEvent::TaskFinished { time, task, node });

        let (dependents, job_done) = match self.state.jobs.get_mut(&task.job) {
            Some(job) => {
                job.finished_tasks += 1;
                let mut unblocked = Vec::new();
                for &d in job.job.dependents(task.index).iter() {
                    let dependent = &mut job.tasks[d];
                    dependent.unfinished_dependencies -= 1;
                    if dependent.unfinished_dependencies == 0 && dependent.status == TaskStatus::Pending {
                        unblocked.push(TaskId::new(task.job, d));
                    }
                }
                (unblocked, job.finished_tasks == job.tasks.len())
            }
            None => (Vec::new(), false),
        };
        for dependent in dependents.into_iter() {
            self.make_ready(dependent);
        }
        if job_done {
            self.finish_job(task.job);
        }
        self.request_cycle();
        Ok(())
    }
}

impl EventHandler for WorkflowScheduler {
    fn on(&mut self, event: Event) {
        if self.is_aborted() {
            return;
        }
        let mut result = Ok(());
        cast!(match event.data {
            JobArrival { job } => {
                self.submit(job);
            }
            ScheduleCycle {} => {
                result = self.run_cycle();
            }
            TaskCompleted { task } => {
                result = self.on_task_completed(task);
            }
        });
        if let Err(e) = result {
            self.abort(e);
        }
    }
}
