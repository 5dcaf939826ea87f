use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::rc::Rc;

use rand::prelude::*;
use rand_pcg::Pcg64;

use wfsim_workflow::config::{AllocationPolicy, SchedulerConfig, SchedulerMode, TaskOrderKind};
use wfsim_workflow::error::{ConfigError, RunError, SchedulerError};
use wfsim_workflow::event_log::EventLog;
use wfsim_workflow::events::{SchedulerEvent, SchedulerListener};
use wfsim_workflow::experiment::{run_trace, Experiment};
use wfsim_workflow::job::{Job, Task};
use wfsim_workflow::monitor::RunMonitor;
use wfsim_workflow::node::{NodeConfig, NodeId};
use wfsim_workflow::policies::elop::{ElopJobAdmission, ElopResourceSelection, ReservationTable};
use wfsim_workflow::policies::simple::*;
use wfsim_workflow::policy::{PolicySet, ResourceSelectionPolicy};
use wfsim_workflow::scheduler::TaskCompleted;
use wfsim_workflow::simulation::WorkflowSimulation;
use wfsim_workflow::state::{JobId, SchedulerState, TaskId, TaskStatus};

fn nodes(count: usize) -> Vec<NodeConfig> {
    (0..count)
        .map(|i| NodeConfig::new(&format!("node{}", i), 1., 1, 1024))
        .collect()
}

fn diamond() -> Job {
    let mut b = Job::builder("diamond");
    let t1 = b.add_task(Task::new("task1", 10.));
    let t2 = b.add_task(Task::new("task2", 10.));
    let t3 = b.add_task(Task::new("task3", 10.));
    let t4 = b.add_task(Task::new("task4", 10.));
    b.add_dependency(t1, t2).add_dependency(t1, t3);
    b.add_dependency(t2, t4).add_dependency(t3, t4);
    b.build().unwrap()
}

fn independent(name: &str, count: usize) -> Job {
    let mut b = Job::builder(name);
    for i in 0..count {
        b.add_task(Task::new(&format!("{}{}", name, i), 10.));
    }
    b.build().unwrap()
}

fn gen_job(rng: &mut Pcg64, name: &str, num_tasks: usize) -> Job {
    let mut b = Job::builder(name);
    for i in 0..num_tasks {
        b.add_task(
            Task::new(&i.to_string(), rng.gen_range(1..100) as f64)
                .with_cores(rng.gen_range(1..3))
                .with_memory(rng.gen_range(0..512)),
        );
    }
    let mut topsort: Vec<usize> = (0..num_tasks).collect();
    topsort.shuffle(rng);
    for i in 1..num_tasks {
        for _ in 0..rng.gen_range(0..3) {
            let dep = rng.gen_range(0..i);
            b.add_dependency(topsort[dep], topsort[i]);
        }
    }
    b.build().unwrap()
}

fn gen_nodes(rng: &mut Pcg64, count: usize) -> Vec<NodeConfig> {
    (0..count)
        .map(|i| NodeConfig::new(&format!("node{}", i), rng.gen_range(1..5) as f64, rng.gen_range(2..5), 1024))
        .collect()
}

fn attach_log(sim: &mut WorkflowSimulation) -> Rc<RefCell<EventLog>> {
    let log = Rc::new(RefCell::new(EventLog::new()));
    sim.add_listener(log.clone());
    log
}

fn started(log: &EventLog) -> Vec<(TaskId, NodeId, f64)> {
    log.events
        .iter()
        .filter_map(|e| match *e {
            SchedulerEvent::TaskStarted { time, task, node } => Some((task, node, time)),
            _ => None,
        })
        .collect()
}

/// Checks that no task starts before its dependencies finish and no node runs two tasks at once.
struct SafetyChecker {
    running: HashMap<NodeId, TaskId>,
    started: usize,
}

impl SafetyChecker {
    fn new() -> Self {
        Self {
            running: HashMap::new(),
            started: 0,
        }
    }
}

impl SchedulerListener for SafetyChecker {
    fn on_event(&mut self, event: &SchedulerEvent, state: &SchedulerState) {
        match *event {
            SchedulerEvent::TaskStarted { task, node, .. } => {
                let job = state.job(task.job).unwrap();
                for dep in job.dependencies(task.index) {
                    assert_eq!(state.task(dep).unwrap().status, TaskStatus::Finished);
                }
                assert_eq!(state.task(task).unwrap().status, TaskStatus::Running);
                assert!(self.running.insert(node, task).is_none(), "node {} is oversubscribed", node);
                assert!(!state.pool().is_available(node));
                self.started += 1;
            }
            SchedulerEvent::TaskFinished { task, node, .. } => {
                assert_eq!(self.running.remove(&node), Some(task));
            }
            _ => {}
        }
    }
}

#[test]
fn diamond_on_two_nodes() {
    let mut sim = WorkflowSimulation::new(123, &nodes(2), &SchedulerConfig::default()).unwrap();
    let log = attach_log(&mut sim);
    sim.submit_at(0, diamond()).unwrap();
    sim.run().unwrap();

    let log = log.borrow();
    let finished = log
        .events
        .iter()
        .filter(|e| matches!(e, SchedulerEvent::TaskFinished { .. }))
        .count();
    let jobs_finished = log
        .events
        .iter()
        .filter(|e| matches!(e, SchedulerEvent::JobFinished { .. }))
        .count();
    assert_eq!(finished, 4);
    assert_eq!(jobs_finished, 1);

    let position = |pred: &dyn Fn(&SchedulerEvent) -> bool| log.events.iter().position(pred).unwrap();
    let task = |i| TaskId::new(JobId(0), i);
    let t1_finished = position(&|e: &SchedulerEvent| matches!(e, SchedulerEvent::TaskFinished { task: t, .. } if *t == task(0)));
    for i in 1..3 {
        let start = position(&|e: &SchedulerEvent| matches!(e, SchedulerEvent::TaskStarted { task: t, .. } if *t == task(i)));
        assert!(t1_finished < start);
    }

    let starts = started(&log);
    assert_eq!(starts[0], (task(0), NodeId(0), 0.));
    assert_eq!(starts[1], (task(1), NodeId(0), 10.));
    assert_eq!(starts[2], (task(2), NodeId(1), 10.));
    assert_eq!(starts[3], (task(3), NodeId(0), 20.));
    assert_eq!(sim.time(), 30.);
    assert!(!sim.scheduler().borrow().state().has_unfinished_jobs());
}

#[test]
fn round_robin_passes_the_turn() {
    let config = AllocationPolicy::RoundRobin { quanta: 2 }.config();
    let mut sim = WorkflowSimulation::new(123, &nodes(6), &config).unwrap();
    let log = attach_log(&mut sim);
    sim.submit_at(0, independent("a", 3)).unwrap();
    sim.submit_at(0, independent("b", 3)).unwrap();
    sim.run().unwrap();

    let order = started(&log.borrow())
        .into_iter()
        .map(|(task, _, time)| {
            assert_eq!(time, 0.);
            (task.job.0, task.index)
        })
        .collect::<Vec<_>>();
    assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1), (0, 2), (1, 2)]);
}

/// Checks that reservations never overlap and never outlive their job.
struct ReservationChecker {
    table: Rc<RefCell<ReservationTable>>,
    max_reserved: usize,
}

impl SchedulerListener for ReservationChecker {
    fn on_event(&mut self, _event: &SchedulerEvent, state: &SchedulerState) {
        let table = self.table.borrow();
        let mut seen = BTreeSet::new();
        for (job, nodes) in table.reservations() {
            let job = state.job(job).expect("reservation of an unknown job");
            assert!(!job.is_finished());
            for node in nodes.iter() {
                assert!(state.pool().contains(*node));
                assert!(seen.insert(*node), "node {} is reserved twice", node);
            }
        }
        self.max_reserved = self.max_reserved.max(seen.len());
    }
}

#[test]
fn elop_reservations_are_disjoint_and_released() {
    let mut rng = Pcg64::seed_from_u64(7);
    let table = Rc::new(RefCell::new(ReservationTable::new()));
    let policies = PolicySet {
        job_admission: Box::new(ElopJobAdmission::new(table.clone())),
        job_order: Box::new(SubmissionTimeJobOrder),
        task_eligibility: Box::new(NullTaskEligibility),
        task_order: Box::new(SubmissionTimeTaskOrder),
        resource_filter: Box::new(FunctionalResourceFilter),
        resource_selection: Box::new(ElopResourceSelection::new(table.clone())),
    };
    let topology = gen_nodes(&mut rng, 5);
    let mut sim = WorkflowSimulation::with_policies(&topology, policies, SchedulerMode::Interactive).unwrap();
    let checker = Rc::new(RefCell::new(ReservationChecker {
        table: table.clone(),
        max_reserved: 0,
    }));
    sim.add_listener(checker.clone());
    let safety = Rc::new(RefCell::new(SafetyChecker::new()));
    sim.add_listener(safety.clone());

    let mut total_tasks = 0;
    for i in 0..10 {
        let n = rng.gen_range(1..15);
        let job = gen_job(&mut rng, &format!("job{}", i), n);
        total_tasks += job.len();
        sim.submit_at(i * 3000, job).unwrap();
    }
    sim.run().unwrap();

    assert_eq!(safety.borrow().started, total_tasks);
    assert!(checker.borrow().max_reserved > 0);
    assert_eq!(table.borrow().reservations().count(), 0);
    assert!(!sim.scheduler().borrow().state().has_unfinished_jobs());
}

#[test]
fn random_dags_respect_dependencies() {
    let policies = [
        "first-fit",
        "min-min",
        "max-min",
        "round-robin[quanta=2]",
        "lottery[rounds=5]",
        "heft",
        "elop",
    ];
    for seed in 0..5 {
        for policy in policies.iter() {
            let mut rng = Pcg64::seed_from_u64(seed);
            let config = policy.parse::<AllocationPolicy>().unwrap().config();
            let n = rng.gen_range(1..6);
            let topology = gen_nodes(&mut rng, n);
            let mut sim = WorkflowSimulation::new(seed, &topology, &config).unwrap();
            let safety = Rc::new(RefCell::new(SafetyChecker::new()));
            sim.add_listener(safety.clone());
            let monitor = Rc::new(RefCell::new(RunMonitor::new(topology.len())));
            sim.add_listener(monitor.clone());

            let mut total_tasks = 0;
            let mut arrival = 0;
            for i in 0..5 {
                let n = rng.gen_range(0..20);
                let job = gen_job(&mut rng, &format!("job{}", i), n);
                total_tasks += job.len();
                arrival += rng.gen_range(0..20_000);
                sim.submit_at(arrival, job).unwrap();
            }
            sim.run().unwrap();

            assert_eq!(safety.borrow().started, total_tasks, "policy {} seed {}", policy, seed);
            let stats = monitor.borrow().stats();
            assert_eq!(stats.jobs_finished, 5);
            assert_eq!(stats.tasks_finished, total_tasks);
            assert!(stats.utilization <= 1. + 1e-9);
            assert!(!sim.scheduler().borrow().state().has_unfinished_jobs());
        }
    }
}

#[test]
fn duplicate_completion_is_ignored() {
    let mut sim = WorkflowSimulation::new(123, &nodes(2), &SchedulerConfig::default()).unwrap();
    let log = attach_log(&mut sim);
    sim.submit_at(0, diamond()).unwrap();
    let scheduler_id = sim.sim.lookup_id("scheduler").unwrap();
    let mut tester = sim.sim.create_context("tester");
    let first = TaskId::new(JobId(0), 0);
    // task1 runs in [0, 10], the job finishes at 30
    tester.emit(TaskCompleted { task: first }, scheduler_id, 15.);
    tester.emit(TaskCompleted { task: first }, scheduler_id, 40.);
    sim.run().unwrap();

    let log = log.borrow();
    let finished = log
        .events
        .iter()
        .filter(|e| matches!(e, SchedulerEvent::TaskFinished { .. }))
        .count();
    let jobs_finished = log
        .events
        .iter()
        .filter(|e| matches!(e, SchedulerEvent::JobFinished { .. }))
        .count();
    assert_eq!(finished, 4);
    assert_eq!(jobs_finished, 1);
    let scheduler = sim.scheduler();
    let scheduler = scheduler.borrow();
    assert_eq!(scheduler.state().pool().available_count(), 2);
    assert!(!scheduler.is_aborted());
}

struct OutOfPoolSelection;

impl SchedulerListener for OutOfPoolSelection {}

impl ResourceSelectionPolicy for OutOfPoolSelection {
    fn select(&mut self, _nodes: &[NodeId], _task: TaskId, _state: &SchedulerState) -> Option<NodeId> {
        Some(NodeId(42))
    }
}

#[test]
fn broken_selection_aborts_the_run() {
    let policies = PolicySet {
        job_admission: Box::new(NullJobAdmission),
        job_order: Box::new(SubmissionTimeJobOrder),
        task_eligibility: Box::new(NullTaskEligibility),
        task_order: Box::new(SubmissionTimeTaskOrder),
        resource_filter: Box::new(FunctionalResourceFilter),
        resource_selection: Box::new(OutOfPoolSelection),
    };
    let mut sim = WorkflowSimulation::with_policies(&nodes(2), policies, SchedulerMode::Interactive).unwrap();
    let log = attach_log(&mut sim);
    sim.submit_at(0, diamond()).unwrap();
    sim.submit_at(5000, diamond()).unwrap();

    match sim.run() {
        Err(SchedulerError::InvariantViolation { reason, dump }) => {
            assert!(reason.contains("node 42"));
            assert_eq!(dump["jobs"][0]["job"], 0);
            assert_eq!(dump["available_nodes"].as_array().map(|a| a.len()), Some(2));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // the second arrival is never processed
    assert_eq!(sim.time(), 0.);
    assert!(started(&log.borrow()).is_empty());

    // other runs are not affected
    let stats = run_trace(vec![(0, diamond())], &nodes(2), &SchedulerConfig::default(), 1).unwrap();
    assert_eq!(stats.jobs_finished, 1);
}

struct NeverSelect;

impl SchedulerListener for NeverSelect {}

impl ResourceSelectionPolicy for NeverSelect {
    fn select(&mut self, _nodes: &[NodeId], _task: TaskId, _state: &SchedulerState) -> Option<NodeId> {
        None
    }
}

#[test]
fn run_with_unfinished_jobs_fails() {
    let policies = PolicySet {
        job_admission: Box::new(NullJobAdmission),
        job_order: Box::new(SubmissionTimeJobOrder),
        task_eligibility: Box::new(NullTaskEligibility),
        task_order: Box::new(SubmissionTimeTaskOrder),
        resource_filter: Box::new(FunctionalResourceFilter),
        resource_selection: Box::new(NeverSelect),
    };
    let mut sim = WorkflowSimulation::with_policies(&nodes(2), policies, SchedulerMode::Interactive).unwrap();
    sim.submit_at(0, diamond()).unwrap();
    sim.submit_at(0, Job::builder("empty").build().unwrap()).unwrap();

    match sim.run() {
        Err(SchedulerError::Stalled { unfinished, dump }) => {
            assert_eq!(unfinished, 1);
            assert_eq!(dump["jobs"][0]["name"], "diamond");
            assert_eq!(dump["ready"].as_array().map(|a| a.len()), Some(1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn task_fitting_no_node_is_rejected() {
    let mut b = Job::builder("huge");
    b.add_task(Task::new("small", 1.));
    b.add_task(Task::new("wide", 1.).with_cores(4));
    let job = b.build().unwrap();

    let mut sim = WorkflowSimulation::new(1, &nodes(2), &SchedulerConfig::default()).unwrap();
    match sim.submit_at(0, job.clone()) {
        Err(ConfigError::UnplaceableTask { job, task }) => {
            assert_eq!(job, "huge");
            assert_eq!(task, "wide");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(sim.event_count(), 0);

    assert!(matches!(
        run_trace(vec![(0, job)], &nodes(2), &AllocationPolicy::Elop.config(), 0),
        Err(RunError::Config(ConfigError::UnplaceableTask { .. }))
    ));
}

#[test]
fn elop_reserves_a_node_the_task_fits() {
    let topology = vec![NodeConfig::new("narrow", 1., 1, 1024), NodeConfig::new("wide", 1., 4, 1024)];
    let mut b = Job::builder("wide");
    b.add_task(Task::new("t", 8.).with_cores(4));
    let stats = run_trace(vec![(0, b.build().unwrap())], &topology, &AllocationPolicy::Elop.config(), 0).unwrap();
    assert_eq!(stats.jobs_finished, 1);
    assert_eq!(stats.makespan, 2.);
}

#[test]
fn elop_extends_reservation_for_stranded_task() {
    // node 0 has one core, node 1 has four
    let topology = vec![NodeConfig::new("narrow", 1., 1, 1024), NodeConfig::new("wide", 1., 4, 1024)];
    let mut sim = WorkflowSimulation::new(1, &topology, &AllocationPolicy::Elop.config()).unwrap();
    let log = attach_log(&mut sim);

    // holds the wide node for 25 s
    let mut long = Job::builder("long");
    long.add_task(Task::new("t", 100.).with_cores(4));
    sim.submit_at(0, long.build().unwrap()).unwrap();

    // its first task only gets the narrow node reserved, the second one needs the wide node
    let mut chain = Job::builder("chain");
    let small = chain.add_task(Task::new("small", 10.));
    let big = chain.add_task(Task::new("big", 10.).with_cores(4));
    chain.add_dependency(small, big);
    sim.submit_at(1000, chain.build().unwrap()).unwrap();
    sim.run().unwrap();

    let placement = started(&log.borrow())
        .into_iter()
        .map(|(task, node, time)| (task.job.0, task.index, node.0, time))
        .collect::<Vec<_>>();
    assert_eq!(placement, vec![(0, 0, 1, 0.), (1, 0, 0, 1.), (1, 1, 1, 25.)]);
    assert_eq!(sim.time(), 27.5);
}

#[test]
fn heft_follows_its_plan() {
    let topology = vec![NodeConfig::new("fast", 2., 1, 0), NodeConfig::new("slow", 1., 1, 0)];
    let mut b = Job::builder("fork");
    let a = b.add_task(Task::new("a", 2.));
    let l = b.add_task(Task::new("l", 4.));
    let r = b.add_task(Task::new("r", 2.));
    let z = b.add_task(Task::new("z", 2.));
    b.add_dependency(a, l).add_dependency(a, r).add_dependency(l, z).add_dependency(r, z);

    let mut sim = WorkflowSimulation::new(1, &topology, &AllocationPolicy::Heft.config()).unwrap();
    let log = attach_log(&mut sim);
    sim.submit_at(0, b.build().unwrap()).unwrap();
    sim.run().unwrap();

    let placement = started(&log.borrow())
        .into_iter()
        .map(|(task, node, time)| (task.index, node.0, time))
        .collect::<Vec<_>>();
    assert_eq!(placement, vec![(a, 0, 0.), (l, 0, 1.), (r, 1, 1.), (z, 0, 3.)]);
    assert_eq!(sim.time(), 4.);
}

#[test]
fn heft_plans_only_on_nodes_with_enough_memory() {
    let topology = vec![NodeConfig::new("fast", 10., 1, 0), NodeConfig::new("roomy", 1., 1, 1024)];
    let mut sim = WorkflowSimulation::new(1, &topology, &AllocationPolicy::Heft.config()).unwrap();
    let log = attach_log(&mut sim);
    let mut b = Job::builder("big");
    b.add_task(Task::new("t", 8.).with_memory(512));
    sim.submit_at(0, b.build().unwrap()).unwrap();
    sim.run().unwrap();

    assert_eq!(started(&log.borrow()), vec![(TaskId::new(JobId(0), 0), NodeId(1), 0.)]);
    assert_eq!(sim.time(), 8.);
}

#[test]
fn heft_runs_a_deep_chain() {
    let mut b = Job::builder("chain");
    for i in 0..2000 {
        b.add_task(Task::new(&i.to_string(), 1.));
        if i > 0 {
            b.add_dependency(i - 1, i);
        }
    }
    let stats = run_trace(vec![(0, b.build().unwrap())], &nodes(3), &AllocationPolicy::Heft.config(), 0).unwrap();
    assert_eq!(stats.tasks_finished, 2000);
    assert_eq!(stats.makespan, 2000.);
}

#[test]
fn min_min_prefers_fast_nodes() {
    let topology = vec![NodeConfig::new("slow", 1., 1, 0), NodeConfig::new("fast", 4., 1, 0)];
    let mut sim = WorkflowSimulation::new(1, &topology, &AllocationPolicy::MinMin.config()).unwrap();
    let log = attach_log(&mut sim);
    let mut b = Job::builder("pair");
    b.add_task(Task::new("big", 40.));
    b.add_task(Task::new("small", 4.));
    sim.submit_at(0, b.build().unwrap()).unwrap();
    sim.run().unwrap();

    let placement = started(&log.borrow())
        .into_iter()
        .map(|(task, node, _)| (task.index, node.0))
        .collect::<Vec<_>>();
    // smallest task first, on the node where it completes earliest
    assert_eq!(placement, vec![(1, 1), (0, 0)]);
}

#[test]
fn lottery_is_deterministic_per_seed() {
    let order = |seed| {
        let config = AllocationPolicy::Lottery { rounds: 3 }.config();
        let topology = vec![NodeConfig::new("node", 1., 2, 1024)];
        let mut sim = WorkflowSimulation::new(seed, &topology, &config).unwrap();
        let log = attach_log(&mut sim);
        let mut rng = Pcg64::seed_from_u64(11);
        sim.submit_at(0, gen_job(&mut rng, "x", 12)).unwrap();
        sim.submit_at(0, gen_job(&mut rng, "y", 12)).unwrap();
        sim.run().unwrap();
        let order = started(&log.borrow());
        order
    };
    assert_eq!(order(5), order(5));
    assert_eq!(order(5).len(), 24);
}

#[test]
fn batch_mode_waits_for_quantum() {
    let config = SchedulerConfig::default().with_mode(SchedulerMode::Batch { quantum: 5. });
    let mut sim = WorkflowSimulation::new(1, &nodes(1), &config).unwrap();
    let log = attach_log(&mut sim);
    let mut b = Job::builder("pair");
    let x = b.add_task(Task::new("x", 10.));
    let y = b.add_task(Task::new("y", 10.));
    b.add_dependency(x, y);
    sim.submit_at(1000, b.build().unwrap()).unwrap();
    sim.run().unwrap();

    let times = started(&log.borrow()).into_iter().map(|(_, _, t)| t).collect::<Vec<_>>();
    assert_eq!(times, vec![5., 20.]);
}

#[test]
fn empty_job_finishes_on_submission() {
    let mut sim = WorkflowSimulation::new(1, &nodes(1), &SchedulerConfig::default()).unwrap();
    let monitor = Rc::new(RefCell::new(RunMonitor::new(1)));
    sim.add_listener(monitor.clone());
    sim.submit_at(2500, Job::builder("empty").build().unwrap()).unwrap();
    sim.run().unwrap();
    let stats = monitor.borrow().stats();
    assert_eq!(stats.jobs_finished, 1);
    assert_eq!(stats.mean_turnaround, 0.);
    assert_eq!(sim.time(), 2.5);
}

#[test]
fn configuration_errors() {
    let config = SchedulerConfig {
        task_order: TaskOrderKind::Heft,
        ..Default::default()
    };
    assert!(matches!(
        WorkflowSimulation::new(1, &nodes(2), &config),
        Err(ConfigError::InconsistentPolicies(_))
    ));
    assert!(matches!(
        WorkflowSimulation::new(1, &[], &SchedulerConfig::default()),
        Err(ConfigError::EmptyTopology)
    ));
    assert!(matches!(
        "fastest".parse::<AllocationPolicy>(),
        Err(ConfigError::UnknownPolicy { .. })
    ));

    let mut sim = WorkflowSimulation::new(1, &nodes(2), &SchedulerConfig::default()).unwrap();
    sim.submit_at(2000, diamond()).unwrap();
    assert!(matches!(
        sim.submit_at(1000, diamond()),
        Err(ConfigError::UnsortedTrace { time: 1000, previous: 2000, .. })
    ));
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn experiment_from_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir,
        "trace.yaml",
        r#"
jobs:
  - name: first
    submit_time: 0
    tasks:
      - name: a
        flops: 10
      - name: b
        flops: 20
        dependencies: [a]
      - name: c
        flops: 20
        dependencies: [a]
  - name: second
    submit_time: 4000
    tasks:
      - name: a
        flops: 5
"#,
    );
    write_file(
        &dir,
        "cluster.yaml",
        r#"
nodes:
  - name: rack
    speed: 1
    cores: 2
    memory: 1024
    count: 2
"#,
    );
    let config = write_file(
        &dir,
        "experiment.yaml",
        &format!(
            r#"
workloads: [{0}/trace.yaml]
topologies: [{0}/cluster.yaml]
policies: [first-fit, heft, elop, round-robin[quanta=1]]
repetitions: 2
mode: interactive
"#,
            dir.path().display()
        ),
    );

    let experiment = Experiment::load(&config).unwrap();
    assert_eq!(experiment.run_count(), 8);
    let results = experiment.run(2);
    assert_eq!(results.len(), 8);
    for result in results.iter() {
        assert!(result.error.is_none(), "{:?}", result.error);
        let stats = result.stats.as_ref().unwrap();
        assert_eq!(stats.jobs_finished, 2);
        assert_eq!(stats.tasks_finished, 4);
    }
    assert_eq!(results[0].workload, "trace.yaml");
    assert_eq!(results[0].topology, "cluster.yaml");

    let broken = write_file(&dir, "broken.yaml", "workloads: [x]\ntopologies: []\npolicies: [fastest]\n");
    assert!(matches!(Experiment::load(&broken), Err(ConfigError::Parse { .. })));
    let missing = dir.path().join("missing.yaml");
    assert!(matches!(Experiment::load(&missing), Err(ConfigError::Io { .. })));
}
