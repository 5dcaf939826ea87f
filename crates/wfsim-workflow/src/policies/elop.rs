//! ELoP (Estimated Level of Parallelism): per-job node reservations.
//!
//! Admission reserves for every active job as many free nodes as the job's level of parallelism,
//! and admits a queued job only if at least one node could be reserved for it. Only nodes able to
//! host some unfinished task of the job are reserved, those hosting more of its tasks first.
//! Selection then puts a task only on a node reserved for its job.
//!
//! A ready task that fits none of its job's reserved nodes gets one more free node that fits it,
//! as soon as such a node is free and unreserved. This may take a job past its level of
//! parallelism.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::job::Job;
use crate::node::{Node, NodeId};
use crate::policy::{Advice, JobAdmissionPolicy, ResourceSelectionPolicy};
use crate::state::{JobId, JobState, SchedulerState, TaskId, TaskStatus};

/// Estimates the maximum number of tasks of the job that can run at once.
///
/// Tokens start on the root tasks and move in steps from every task holding one to all of its
/// dependents. The result is the largest number of distinct token holders seen in a step. A task
/// reached at different depths is counted in every such step, so DAGs with edges skipping levels
/// may get a larger estimate than their true width.
///
/// The over-count is kept on purpose: reservations follow this estimate, not the exact width.
pub fn level_of_parallelism(job: &Job) -> usize {
    let mut current = job.roots().collect::<BTreeSet<_>>();
    let mut max = current.len();
    while current.iter().any(|&t| !job.dependents(t).is_empty()) {
        current = current
            .iter()
            .flat_map(|&t| job.dependents(t).iter().copied())
            .collect();
        max = max.max(current.len());
    }
    max
}

fn unfinished_tasks_hosted(job: &JobState, node: &Node) -> usize {
    job.tasks
        .iter()
        .zip(job.job.tasks().iter())
        .filter(|(state, task)| state.status != TaskStatus::Finished && node.fits(task))
        .count()
}

/// Nodes reserved per job, shared by the ELoP admission and selection policies.
pub struct ReservationTable {
    reserved: BTreeMap<JobId, Vec<NodeId>>,
    lop: HashMap<JobId, usize>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self {
            reserved: BTreeMap::new(),
            lop: HashMap::new(),
        }
    }

    pub fn reserved(&self, job: JobId) -> &[NodeId] {
        self.reserved.get(&job).map_or(&[][..], |nodes| nodes.as_slice())
    }

    /// All reservations, by job.
    pub fn reservations(&self) -> impl Iterator<Item = (JobId, &[NodeId])> {
        self.reserved.iter().map(|(job, nodes)| (*job, nodes.as_slice()))
    }

    pub fn owner(&self, node: NodeId) -> Option<JobId> {
        self.reserved
            .iter()
            .find(|(_, nodes)| nodes.contains(&node))
            .map(|(job, _)| *job)
    }

    pub fn release(&mut self, job: JobId) {
        self.reserved.remove(&job);
        self.lop.remove(&job);
    }

    /// Drops reservations of jobs that are finished or no longer known to the scheduler.
    pub fn purge(&mut self, state: &SchedulerState) {
        let stale = self
            .reserved
            .keys()
            .chain(self.lop.keys())
            .filter(|&&job| state.job(job).map_or(true, |j| j.is_finished()))
            .copied()
            .collect::<Vec<_>>();
        for job in stale.into_iter() {
            self.release(job);
        }
    }

    /// Tops up the reservation of the job toward its level of parallelism.
    ///
    /// Reserves only if the job is below its level and there are more free unreserved nodes than it
    /// already holds. Returns whether anything was reserved.
    fn reserve_if_needed(&mut self, job: &JobState, state: &SchedulerState) -> bool {
        let lop = *self
            .lop
            .entry(job.id)
            .or_insert_with(|| level_of_parallelism(&job.job));
        let current = self.reserved(job.id).len();
        let free = self.free_nodes(state);
        if lop <= current || free.len() <= current {
            return false;
        }
        let hosted = |id: &NodeId| state.node(*id).map_or(0, |node| unfinished_tasks_hosted(job, node));
        let mut free = free.into_iter().filter(|id| hosted(id) > 0).collect::<Vec<_>>();
        if free.is_empty() {
            return false;
        }
        free.sort_by_key(|id| Reverse(hosted(id)));
        self.reserved
            .entry(job.id)
            .or_default()
            .extend(free.into_iter().take(lop - current));
        true
    }
}

impl ReservationTable {
    fn free_nodes(&self, state: &SchedulerState) -> Vec<NodeId> {
        let taken = self.reserved.values().flatten().copied().collect::<BTreeSet<_>>();
        state
            .pool()
            .available_nodes()
            .into_iter()
            .filter(|node| !taken.contains(node))
            .collect()
    }

    /// Reserves a free node for every ready task of an active job that fits none of the nodes
    /// already reserved for the job.
    pub fn cover_ready_tasks(&mut self, state: &SchedulerState) {
        for task in state.ready_tasks() {
            if !state.is_active(task.job) {
                continue;
            }
            let spec = match state.task_spec(task) {
                Some(spec) => spec,
                None => continue,
            };
            let fits = |id: &NodeId| state.node(*id).map_or(false, |node| node.fits(spec));
            if self.reserved(task.job).iter().any(|id| fits(id)) {
                continue;
            }
            if let Some(node) = self.free_nodes(state).into_iter().find(|id| fits(id)) {
                self.reserved.entry(task.job).or_default().push(node);
            }
        }
    }
}

impl Default for ReservationTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ElopJobAdmission {
    table: Rc<RefCell<ReservationTable>>,
}

impl ElopJobAdmission {
    pub fn new(table: Rc<RefCell<ReservationTable>>) -> Self {
        Self { table }
    }
}

impl SchedulerListener for ElopJobAdmission {
    fn on_event(&mut self, event: &SchedulerEvent, state: &SchedulerState) {
        let mut table = self.table.borrow_mut();
        match event {
            SchedulerEvent::JobFinished { job, .. } => {
                table.release(*job);
                table.cover_ready_tasks(state);
            }
            SchedulerEvent::TaskReady { .. } | SchedulerEvent::TaskFinished { .. } => table.cover_ready_tasks(state),
            _ => {}
        }
    }
}

impl JobAdmissionPolicy for ElopJobAdmission {
    fn admit(&mut self, job: JobId, state: &SchedulerState) -> Advice {
        let mut table = self.table.borrow_mut();
        table.purge(state);
        for active in state.active_jobs() {
            table.reserve_if_needed(active, state);
        }
        match state.job(job) {
            Some(job) if table.reserve_if_needed(job, state) => Advice::Admit,
            _ => Advice::Deny,
        }
    }
}

/// Selects the first node reserved for the task's job that is among the candidates.
pub struct ElopResourceSelection {
    table: Rc<RefCell<ReservationTable>>,
}

impl ElopResourceSelection {
    pub fn new(table: Rc<RefCell<ReservationTable>>) -> Self {
        Self { table }
    }
}

impl SchedulerListener for ElopResourceSelection {}

impl ResourceSelectionPolicy for ElopResourceSelection {
    fn select(&mut self, nodes: &[NodeId], task: TaskId, _state: &SchedulerState) -> Option<NodeId> {
        self.table
            .borrow()
            .reserved(task.job)
            .iter()
            .find(|node| nodes.contains(node))
            .copied()
    }
}
