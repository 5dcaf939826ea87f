//! Workload trace loading.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::job::{Job, Task};

fn default_cores() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub flops: f64,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default)]
    pub memory: u64,
    /// Names of the tasks of the same job this task depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub deadline: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    /// Arrival time in milliseconds.
    pub submit_time: i64,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl JobRecord {
    /// Builds the job, resolving dependencies by task name.
    pub fn to_job(&self) -> Result<Job, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidJob {
            job: self.name.clone(),
            reason,
        };
        let mut builder = Job::builder(&self.name);
        let mut index = HashMap::new();
        for record in self.tasks.iter() {
            let mut task = Task::new(&record.name, record.flops)
                .with_cores(record.cores)
                .with_memory(record.memory);
            if let Some(deadline) = record.deadline {
                task = task.with_deadline(deadline);
            }
            let id = builder.add_task(task);
            if index.insert(record.name.as_str(), id).is_some() {
                return Err(invalid(format!("duplicate task name `{}`", record.name)));
            }
        }
        for (id, record) in self.tasks.iter().enumerate() {
            for dep in record.dependencies.iter() {
                let dep_id = *index
                    .get(dep.as_str())
                    .ok_or_else(|| invalid(format!("task `{}` depends on unknown task `{}`", record.name, dep)))?;
                builder.add_dependency(dep_id, id);
            }
        }
        builder.build()
    }
}

#[derive(Debug, Deserialize)]
struct TraceFile {
    jobs: Vec<JobRecord>,
}

/// Builds `(arrival time in ms, job)` pairs, checking that arrivals are sorted.
pub fn trace_from_records(records: &[JobRecord]) -> Result<Vec<(i64, Job)>, ConfigError> {
    let mut trace = Vec::with_capacity(records.len());
    let mut previous: Option<i64> = None;
    for record in records.iter() {
        if let Some(previous) = previous {
            if record.submit_time < previous {
                return Err(ConfigError::UnsortedTrace {
                    job: record.name.clone(),
                    time: record.submit_time,
                    previous,
                });
            }
        }
        if record.submit_time < 0 {
            return Err(ConfigError::ArrivalInPast {
                job: record.name.clone(),
                time: record.submit_time,
            });
        }
        previous = Some(record.submit_time);
        trace.push((record.submit_time, record.to_job()?));
    }
    Ok(trace)
}

/// Loads a workload trace from a YAML file.
///
/// Trace file example:
///
/// ```yaml
/// jobs:
///   - name: montage
///     submit_time: 0
///     tasks:
///       - name: project
///         flops: 2.0e10
///       - name: add
///         flops: 1.0e10
///         cores: 2
///         dependencies: [project]
/// ```
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<(i64, Job)>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: TraceFile = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    trace_from_records(&file.jobs)
}
