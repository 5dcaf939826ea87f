//! Tool for running multiple experiments.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::config::{AllocationPolicy, SchedulerConfig, SchedulerMode};
use crate::error::{ConfigError, RunError};
use crate::job::Job;
use crate::monitor::{RunMonitor, RunStats};
use crate::node::{load_nodes, NodeConfig, ResourcePool};
use crate::simulation::WorkflowSimulation;
use crate::workload::load_trace;

/// Contains result of one run.
#[derive(Serialize, Debug, Clone)]
pub struct RunResult {
    pub workload: String,
    pub topology: String,
    pub policy: String,
    pub repetition: usize,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_repetitions() -> usize {
    1
}

#[derive(Deserialize)]
struct ExperimentConfig {
    workloads: Vec<PathBuf>,
    topologies: Vec<PathBuf>,
    policies: Vec<AllocationPolicy>,
    #[serde(default = "default_repetitions")]
    repetitions: usize,
    #[serde(default)]
    mode: SchedulerMode,
}

struct Run {
    workload_name: String,
    trace: Arc<Vec<(i64, Job)>>,
    topology_name: String,
    nodes: Arc<Vec<NodeConfig>>,
    policy: AllocationPolicy,
    repetition: usize,
}

/// Simulates the trace on the nodes with a fresh scheduler and returns the collected metrics.
pub fn run_trace(
    trace: Vec<(i64, Job)>,
    nodes: &[NodeConfig],
    config: &SchedulerConfig,
    seed: u64,
) -> Result<RunStats, RunError> {
    let mut sim = WorkflowSimulation::new(seed, nodes, config)?;
    let monitor = Rc::new(RefCell::new(RunMonitor::new(sim.scheduler().borrow().state().pool().len())));
    sim.add_listener(monitor.clone());
    sim.submit_trace(trace)?;
    sim.run()?;
    let stats = monitor.borrow().stats();
    Ok(stats)
}

/// Cartesian product of workloads, topologies, allocation policies and repetitions.
pub struct Experiment {
    runs: Vec<Run>,
    mode: SchedulerMode,
}

impl Experiment {
    /// Load config from a file.
    ///
    /// Config file example:
    ///
    /// ```yaml
    /// workloads: [traces/]
    /// topologies: [topologies/small.yaml]
    /// policies: [first-fit, min-min, round-robin[quanta=2], heft, elop]
    /// repetitions: 3
    /// mode: batch[quantum=10]
    /// ```
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ExperimentConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let workloads = get_all_files(&config.workloads)?
            .into_iter()
            .map(|path| -> Result<_, ConfigError> { Ok((file_name(&path), Arc::new(load_trace(&path)?))) })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let topologies = get_all_files(&config.topologies)?
            .into_iter()
            .map(|path| -> Result<_, ConfigError> {
                let nodes = load_nodes(&path)?;
                ResourcePool::new(&nodes)?;
                Ok((file_name(&path), Arc::new(nodes)))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let runs = workloads
            .into_iter()
            .cartesian_product(topologies.into_iter())
            .cartesian_product(config.policies.into_iter())
            .cartesian_product(0..config.repetitions)
            .map(
                |((((workload_name, trace), (topology_name, nodes)), policy), repetition)| Run {
                    workload_name,
                    trace,
                    topology_name,
                    nodes,
                    policy,
                    repetition,
                },
            )
            .collect::<Vec<_>>();

        Ok(Self {
            runs,
            mode: config.mode,
        })
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Run all experiments.
    ///
    /// A failed run is reported in its result and does not affect the others.
    pub fn run(self, num_threads: usize) -> Vec<RunResult> {
        let total_runs = self.runs.len();
        let mode = self.mode;

        let finished_runs = Arc::new(AtomicUsize::new(0));
        let result = Arc::new(Mutex::new(Vec::new()));

        let pool = ThreadPool::new(num_threads.max(1));
        let start_time = Instant::now();
        for run in self.runs.into_iter() {
            let finished_runs = finished_runs.clone();
            let result = result.clone();
            pool.execute(move || {
                let seed = run.repetition as u64;
                let config = run.policy.config().with_mode(mode);
                let outcome = run_trace(run.trace.as_ref().clone(), &run.nodes, &config, seed);
                let (stats, error) = match outcome {
                    Ok(stats) => (Some(stats), None),
                    Err(e) => (None, Some(e.to_string())),
                };

                result.lock().unwrap_or_else(PoisonError::into_inner).push(RunResult {
                    workload: run.workload_name,
                    topology: run.topology_name,
                    policy: run.policy.to_string(),
                    repetition: run.repetition,
                    seed,
                    stats,
                    error,
                });

                let finished = finished_runs.fetch_add(1, Ordering::SeqCst) + 1;
                let elapsed = start_time.elapsed();
                let remaining =
                    Duration::from_secs_f64(elapsed.as_secs_f64() / finished as f64 * (total_runs - finished) as f64);
                print!("\r{}", " ".repeat(70));
                print!(
                    "\rFinished {}/{} [{}%] runs in {:.2?}, remaining time: {:.2?}",
                    finished,
                    total_runs,
                    (finished as f64 * 100. / total_runs as f64).round() as i32,
                    elapsed,
                    remaining
                );
                std::io::stdout().flush().ok();
            });
        }

        pool.join();

        print!("\r{}", " ".repeat(70));
        println!("\rFinished {} runs in {:.2?}", total_runs, start_time.elapsed());

        let mut result = std::mem::take(&mut *result.lock().unwrap_or_else(PoisonError::into_inner));
        result.sort_by(|a, b| {
            (&a.workload, &a.topology, &a.policy, a.repetition).cmp(&(&b.workload, &b.topology, &b.policy, b.repetition))
        });
        result
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn get_all_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    let mut result = Vec::new();
    for path in paths.iter() {
        if path.is_dir() {
            let io_error = |source| ConfigError::Io {
                path: path.clone(),
                source,
            };
            let mut entries = std::fs::read_dir(path)
                .map_err(io_error)?
                .map(|entry| entry.map(|e| e.path()).map_err(io_error))
                .collect::<Result<Vec<_>, _>>()?;
            entries.sort();
            result.extend(get_all_files(&entries)?);
        } else {
            result.push(path.clone());
        }
    }
    Ok(result)
}
