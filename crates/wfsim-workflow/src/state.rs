//! Mutable scheduler bookkeeping: job and task states, the node pool and the queues.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::json;

use crate::job::{Job, Task};
use crate::node::{Node, NodeId, ResourcePool};

/// Identifier of a submitted job, increasing in submission order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task of a submitted job.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskId {
    pub job: JobId,
    pub index: usize,
}

impl TaskId {
    pub fn new(job: JobId, index: usize) -> Self {
        Self { job, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job, self.index)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Waiting in the admission queue.
    Submitted,
    /// Admitted, its tasks are being scheduled.
    Active,
    /// All tasks are finished.
    Finished,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// Waiting for its dependencies or for the job to be admitted.
    Pending,
    /// All dependencies are finished, waiting for a node.
    Ready,
    /// A node is reserved for the task.
    Assigned,
    Running,
    Finished,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskState {
    pub status: TaskStatus,
    pub node: Option<NodeId>,
    pub ready_at: Option<f64>,
    pub started_at: Option<f64>,
    pub finished_at: Option<f64>,
    pub(crate) unfinished_dependencies: usize,
}

#[derive(Clone, Debug)]
pub struct JobState {
    pub id: JobId,
    pub job: Rc<Job>,
    pub status: JobStatus,
    pub submitted_at: f64,
    pub started_at: Option<f64>,
    pub finished_at: Option<f64>,
    pub tasks: Vec<TaskState>,
    pub(crate) finished_tasks: usize,
}

impl JobState {
    pub(crate) fn new(id: JobId, job: Rc<Job>, time: f64) -> Self {
        let tasks = job
            .tasks()
            .iter()
            .map(|task| TaskState {
                status: TaskStatus::Pending,
                node: None,
                ready_at: None,
                started_at: None,
                finished_at: None,
                unfinished_dependencies: task.dependencies.len(),
            })
            .collect();
        Self {
            id,
            job,
            status: JobStatus::Submitted,
            submitted_at: time,
            started_at: None,
            finished_at: None,
            tasks,
            finished_tasks: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == JobStatus::Finished
    }

    pub fn finished_tasks(&self) -> usize {
        self.finished_tasks
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.tasks.len()).map(move |i| TaskId::new(self.id, i))
    }

    pub fn dependencies(&self, task: usize) -> impl Iterator<Item = TaskId> + '_ {
        self.job.dependencies(task).iter().map(move |&i| TaskId::new(self.id, i))
    }

    pub fn dependents(&self, task: usize) -> impl Iterator<Item = TaskId> + '_ {
        self.job.dependents(task).iter().map(move |&i| TaskId::new(self.id, i))
    }
}

/// Everything the scheduler knows about the system, as seen by policies.
///
/// Policies receive it by shared reference; only the scheduler mutates it.
pub struct SchedulerState {
    pub(crate) time: f64,
    pub(crate) pool: ResourcePool,
    pub(crate) jobs: BTreeMap<JobId, JobState>,
    pub(crate) queue: Vec<JobId>,
    pub(crate) ready: IndexSet<TaskId>,
    next_job_id: u64,
}

impl SchedulerState {
    pub fn new(pool: ResourcePool) -> Self {
        Self {
            time: 0.,
            pool,
            jobs: BTreeMap::new(),
            queue: Vec::new(),
            ready: IndexSet::new(),
            next_job_id: 0,
        }
    }

    /// Simulation time of the current scheduling step.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.pool.node(id)
    }

    /// Jobs which are not finished yet, in submission order.
    pub fn jobs(&self) -> impl Iterator<Item = &JobState> {
        self.jobs.values()
    }

    pub fn job(&self, id: JobId) -> Option<&JobState> {
        self.jobs.get(&id)
    }

    pub fn active_jobs(&self) -> impl Iterator<Item = &JobState> {
        self.jobs.values().filter(|j| j.status == JobStatus::Active)
    }

    pub fn is_active(&self, id: JobId) -> bool {
        self.jobs.get(&id).map_or(false, |j| j.status == JobStatus::Active)
    }

    /// Jobs waiting for admission, in queue order.
    pub fn queued_jobs(&self) -> &[JobId] {
        &self.queue
    }

    /// Ready tasks in the order they became ready.
    pub fn ready_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ready.iter().copied()
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskState> {
        self.jobs.get(&id.job).and_then(|j| j.tasks.get(id.index))
    }

    /// Definition of the task.
    pub fn task_spec(&self, id: TaskId) -> Option<&Task> {
        self.jobs.get(&id.job).and_then(|j| j.job.tasks().get(id.index))
    }

    /// Time in seconds the task takes on the node.
    pub fn runtime(&self, task: TaskId, node: NodeId) -> Option<f64> {
        let spec = self.task_spec(task)?;
        Some(self.pool.node(node)?.runtime(spec))
    }

    /// Whether there are jobs waiting for admission or tasks waiting for a node.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || !self.ready.is_empty()
    }

    /// Whether some submitted job is not finished yet.
    pub fn has_unfinished_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Registers a submitted job and puts it at the end of the admission queue.
    pub(crate) fn insert_job(&mut self, job: Rc<Job>) -> JobId {
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;
        self.jobs.insert(id, JobState::new(id, job, self.time));
        self.queue.push(id);
        id
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Option<&mut TaskState> {
        self.jobs.get_mut(&id.job).and_then(|j| j.tasks.get_mut(id.index))
    }

    /// Snapshot of job, task and node ids used in error reports.
    pub fn dump(&self) -> serde_json::Value {
        let jobs = self
            .jobs
            .values()
            .map(|j| {
                let tasks = j
                    .tasks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| json!({"task": i, "status": t.status, "node": t.node}))
                    .collect::<Vec<_>>();
                json!({"job": j.id, "name": j.job.name, "status": j.status, "tasks": tasks})
            })
            .collect::<Vec<_>>();
        json!({
            "time": self.time,
            "jobs": jobs,
            "queue": self.queue,
            "ready": self.ready.iter().collect::<Vec<_>>(),
            "available_nodes": self.pool.available_nodes(),
        })
    }
}
