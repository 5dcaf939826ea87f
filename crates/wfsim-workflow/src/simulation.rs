//! Simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use wfsim_core::context::SimulationContext;
use wfsim_core::simulation::Simulation;
use wfsim_core::Id;

use crate::config::{SchedulerConfig, SchedulerMode};
use crate::error::{ConfigError, SchedulerError};
use crate::events::SchedulerListener;
use crate::job::Job;
use crate::node::{NodeConfig, ResourcePool};
use crate::policy::PolicySet;
use crate::scheduler::{JobArrival, WorkflowScheduler};

/// Provides a convenient API for configuring and running simulations of a workflow scheduler.
///
/// Jobs are fed with their arrival times in milliseconds; each arrival is delivered to the
/// scheduler at the matching simulation time (in seconds).
pub struct WorkflowSimulation {
    pub sim: Simulation,
    scheduler: Rc<RefCell<WorkflowScheduler>>,
    scheduler_id: Id,
    trace: SimulationContext,
    last_arrival: Option<i64>,
}

impl WorkflowSimulation {
    /// Creates simulation with provided random seed, nodes and scheduler configuration.
    pub fn new(seed: u64, nodes: &[NodeConfig], config: &SchedulerConfig) -> Result<Self, ConfigError> {
        let policies = config.build_policies(seed)?;
        Self::with_policies(nodes, policies, config.mode)
    }

    /// Creates simulation with an explicitly assembled policy set.
    pub fn with_policies(
        nodes: &[NodeConfig],
        policies: PolicySet,
        mode: SchedulerMode,
    ) -> Result<Self, ConfigError> {
        let pool = ResourcePool::new(nodes)?;
        let mut sim = Simulation::new();
        let scheduler = Rc::new(RefCell::new(WorkflowScheduler::new(
            pool,
            policies,
            mode,
            sim.create_context("scheduler"),
        )));
        let scheduler_id = sim.add_handler("scheduler", scheduler.clone());
        let trace = sim.create_context("trace");
        Ok(Self {
            sim,
            scheduler,
            scheduler_id,
            trace,
            last_arrival: None,
        })
    }

    pub fn add_listener(&mut self, listener: Rc<RefCell<dyn SchedulerListener>>) {
        self.scheduler.borrow_mut().add_listener(listener);
    }

    pub fn scheduler(&self) -> Rc<RefCell<WorkflowScheduler>> {
        self.scheduler.clone()
    }

    /// Schedules the arrival of a job at the given time in milliseconds.
    ///
    /// Arrivals must come in non-decreasing time order and not before the current time. Every task
    /// must fit on at least one node of the pool.
    pub fn submit_at(&mut self, arrival_ms: i64, job: Job) -> Result<(), ConfigError> {
        if let Some(previous) = self.last_arrival {
            if arrival_ms < previous {
                return Err(ConfigError::UnsortedTrace {
                    job: job.name,
                    time: arrival_ms,
                    previous,
                });
            }
        }
        let delay = arrival_ms as f64 / 1000. - self.sim.time();
        if delay < 0. {
            return Err(ConfigError::ArrivalInPast {
                job: job.name,
                time: arrival_ms,
            });
        }
        if let Some(task) = self.unplaceable_task(&job) {
            return Err(ConfigError::UnplaceableTask { job: job.name, task });
        }
        self.last_arrival = Some(arrival_ms);
        self.trace.emit(JobArrival { job }, self.scheduler_id, delay);
        Ok(())
    }

    fn unplaceable_task(&self, job: &Job) -> Option<String> {
        let scheduler = self.scheduler.borrow();
        let pool = scheduler.state().pool();
        job.tasks()
            .iter()
            .find(|task| !pool.nodes().iter().any(|node| node.fits(task)))
            .map(|task| task.name.clone())
    }

    /// Schedules the arrivals of all jobs of a trace.
    pub fn submit_trace<I>(&mut self, trace: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (i64, Job)>,
    {
        for (arrival_ms, job) in trace.into_iter() {
            self.submit_at(arrival_ms, job)?;
        }
        Ok(())
    }

    /// Runs the simulation until there are no pending events or the scheduler aborts.
    ///
    /// Fails if the scheduler aborted or if some submitted job is left unfinished.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        let scheduler = self.scheduler.clone();
        self.sim.step_while(|| !scheduler.borrow().is_aborted());
        let scheduler = scheduler.borrow();
        if let Some(e) = scheduler.error() {
            return Err(e.clone());
        }
        let state = scheduler.state();
        if state.has_unfinished_jobs() {
            return Err(SchedulerError::Stalled {
                unfinished: state.jobs().count(),
                dump: state.dump(),
            });
        }
        Ok(())
    }

    /// Steps through the simulation with duration limit.
    ///
    /// See [Simulation::step_for_duration()](wfsim_core::simulation::Simulation::step_for_duration).
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim.time()
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }
}
