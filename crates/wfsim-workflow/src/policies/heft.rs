//! HEFT (Heterogeneous Earliest Finish Time) task order and resource selection.
//!
//! Both policies share one [`HeftState`]. When a job starts, its tasks are planned on the nodes of
//! the pool by list scheduling with insertion: tasks are taken in non-increasing upward rank and
//! each is put on the node where it finishes earliest, possibly into an idle gap left between
//! already planned tasks. The plan is then followed: tasks are ordered by planned finish time and
//! each task goes only to its planned node.
//!
//! The plan is made once per job, from empty node timelines and in times relative to the job start.
//! It is not revised when the planned node happens to be busy; the task simply waits for it.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::job::Job;
use crate::node::{NodeId, ResourcePool};
use crate::policy::{ResourceSelectionPolicy, TaskOrderPolicy};
use crate::state::{JobId, JobState, SchedulerState, TaskId};

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedTask {
    pub task: usize,
    pub start: f64,
    pub end: f64,
}

struct JobPlan {
    // per node, sorted by start time
    timelines: Vec<Vec<PlannedTask>>,
    placement: Vec<Option<(NodeId, f64, f64)>>,
}

/// Computes upward ranks of job tasks.
///
/// Rank of a task is its mean execution time plus the maximum rank among its dependents, so a
/// sink task has its own execution time as rank. Communication costs are zero. Tasks are visited in
/// reverse topological order, so the deepest chain needs no recursion.
pub fn calc_ranks(job: &Job, avg_flop_time: f64) -> Vec<f64> {
    let mut ranks = vec![0.; job.len()];
    for &v in job.topological_order().iter().rev() {
        let task = job.task(v);
        let own = task.flops * avg_flop_time / task.cores.max(1) as f64;
        let succ = job
            .dependents(v)
            .iter()
            .map(|&s| ranks[s])
            .max_by(|a: &f64, b: &f64| a.total_cmp(b))
            .unwrap_or(0.);
        ranks[v] = own + succ;
    }
    ranks
}

/// Returns the earliest start time not before `desired_start` at which a task of the given
/// duration fits on the timeline, either into a gap between planned tasks or after the last one.
pub fn find_first_gap(timeline: &[PlannedTask], desired_start: f64, duration: f64) -> f64 {
    let mut prev_end = 0.;
    for slot in timeline.iter() {
        let earliest = desired_start.max(prev_end);
        if slot.start - earliest >= duration {
            return earliest;
        }
        prev_end = slot.end;
    }
    desired_start.max(prev_end)
}

/// HEFT plans of the started jobs.
pub struct HeftState {
    plans: HashMap<JobId, JobPlan>,
}

impl HeftState {
    pub fn new() -> Self {
        Self { plans: HashMap::new() }
    }

    /// Plans all tasks of the job on the nodes of the pool.
    pub fn add_job(&mut self, job: &JobState, pool: &ResourcePool) {
        let dag = &job.job;
        let ranks = calc_ranks(dag, pool.avg_flop_time());

        let mut position = vec![0; dag.len()];
        for (i, &v) in dag.topological_order().iter().enumerate() {
            position[v] = i;
        }
        let mut tasks = (0..dag.len()).collect::<Vec<_>>();
        tasks.sort_by(|&a, &b| ranks[b].total_cmp(&ranks[a]).then(position[a].cmp(&position[b])));

        let mut timelines = vec![Vec::<PlannedTask>::new(); pool.len()];
        let mut placement: Vec<Option<(NodeId, f64, f64)>> = vec![None; dag.len()];
        for task in tasks.into_iter() {
            let spec = dag.task(task);
            let desired_start = dag
                .dependencies(task)
                .iter()
                .filter_map(|&d| placement[d].map(|(_, _, end)| end))
                .max_by(|a, b| a.total_cmp(b))
                .unwrap_or(0.);

            let mut best: Option<(NodeId, f64, f64)> = None;
            for node in pool.nodes().iter() {
                if !node.fits(spec) {
                    continue;
                }
                let duration = node.runtime(spec);
                let start = find_first_gap(&timelines[node.id.0], desired_start, duration);
                let end = start + duration;
                if best.map_or(true, |(_, _, best_end)| end < best_end) {
                    best = Some((node.id, start, end));
                }
            }

            if let Some((node, start, end)) = best {
                let timeline = &mut timelines[node.0];
                let pos = timeline.partition_point(|p| p.start <= start);
                timeline.insert(pos, PlannedTask { task, start, end });
                placement[task] = Some((node, start, end));
            }
        }

        self.plans.insert(job.id, JobPlan { timelines, placement });
    }

    pub fn remove_job(&mut self, job: JobId) {
        self.plans.remove(&job);
    }

    /// Planned node, start and end of the task.
    pub fn planned(&self, task: TaskId) -> Option<(NodeId, f64, f64)> {
        self.plans.get(&task.job)?.placement.get(task.index).copied().flatten()
    }

    pub fn agent(&self, task: TaskId) -> Option<NodeId> {
        self.planned(task).map(|(node, _, _)| node)
    }

    pub fn timeline(&self, job: JobId, node: NodeId) -> Option<&[PlannedTask]> {
        self.plans.get(&job)?.timelines.get(node.0).map(|t| t.as_slice())
    }

    pub fn planned_jobs(&self) -> usize {
        self.plans.len()
    }
}

impl Default for HeftState {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders tasks by planned finish time, then planned start time. Unplanned tasks go last.
pub struct HeftTaskOrder {
    state: Rc<RefCell<HeftState>>,
}

impl HeftTaskOrder {
    pub fn new(state: Rc<RefCell<HeftState>>) -> Self {
        Self { state }
    }
}

impl SchedulerListener for HeftTaskOrder {}

impl TaskOrderPolicy for HeftTaskOrder {
    fn compare(&self, a: TaskId, b: TaskId, _state: &SchedulerState) -> Ordering {
        let heft = self.state.borrow();
        match (heft.planned(a), heft.planned(b)) {
            (Some((_, a_start, a_end)), Some((_, b_start, b_end))) => {
                a_end.total_cmp(&b_end).then(a_start.total_cmp(&b_start))
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Selects the planned node of the task if it is among the candidates.
///
/// Owns the plan lifecycle: plans a job when it starts and drops the plan when it finishes.
pub struct HeftResourceSelection {
    state: Rc<RefCell<HeftState>>,
}

impl HeftResourceSelection {
    pub fn new(state: Rc<RefCell<HeftState>>) -> Self {
        Self { state }
    }
}

impl SchedulerListener for HeftResourceSelection {
    fn on_event(&mut self, event: &SchedulerEvent, state: &SchedulerState) {
        match event {
            SchedulerEvent::JobStarted { job, .. } => {
                if let Some(job) = state.job(*job) {
                    self.state.borrow_mut().add_job(job, state.pool());
                }
            }
            SchedulerEvent::JobFinished { job, .. } => self.state.borrow_mut().remove_job(*job),
            _ => {}
        }
    }
}

impl ResourceSelectionPolicy for HeftResourceSelection {
    fn select(&mut self, nodes: &[NodeId], task: TaskId, _state: &SchedulerState) -> Option<NodeId> {
        let agent = self.state.borrow().agent(task)?;
        nodes.contains(&agent).then_some(agent)
    }
}
