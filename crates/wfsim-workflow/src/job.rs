//! Workflow definition: a job is an immutable DAG of tasks.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::ConfigError;

/// A unit of work inside a job.
///
/// Described by the amount of computations in flops, the number of used cores and the amount of used memory.
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub name: String,
    /// The amount of computations performed by this task in flops.
    pub flops: f64,
    pub cores: u32,
    /// Memory demand of this task in MB.
    pub memory: u64,
    /// Optional deadline in seconds relative to the job submission.
    pub deadline: Option<f64>,
    /// Indices of the tasks of the same job that must finish before this one starts.
    pub dependencies: Vec<usize>,
}

impl Task {
    pub fn new(name: &str, flops: f64) -> Self {
        Self {
            name: name.to_string(),
            flops,
            cores: 1,
            memory: 0,
            deadline: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    pub fn with_memory(mut self, memory: u64) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_deadline(mut self, deadline: f64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Validated DAG of tasks.
///
/// Tasks are addressed by their index. Created through [`JobBuilder`], which rejects unknown or
/// self dependencies and cycles, so every `Job` is acyclic.
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    pub name: String,
    tasks: Vec<Task>,
    #[serde(skip)]
    dependents: Vec<Vec<usize>>,
    #[serde(skip)]
    topological_order: Vec<usize>,
}

impl Job {
    pub fn builder(name: &str) -> JobBuilder {
        JobBuilder {
            name: name.to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> &Task {
        &self.tasks[index]
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.tasks[index].dependencies
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Tasks without dependencies, in index order.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.tasks.len()).filter(move |&i| self.tasks[i].is_root())
    }

    /// Task indices ordered so that every task comes after all of its dependencies.
    ///
    /// Among tasks that become available at the same time the smaller index goes first.
    pub fn topological_order(&self) -> &[usize] {
        &self.topological_order
    }

    pub fn total_flops(&self) -> f64 {
        self.tasks.iter().map(|t| t.flops).sum()
    }
}

/// Collects tasks and dependencies of a job, then validates them on [`build`](JobBuilder::build).
pub struct JobBuilder {
    name: String,
    tasks: Vec<Task>,
}

impl JobBuilder {
    /// Adds a task and returns its index.
    pub fn add_task(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    /// Makes `task` wait for `dependency`.
    pub fn add_dependency(&mut self, dependency: usize, task: usize) -> &mut Self {
        if let Some(t) = self.tasks.get_mut(task) {
            t.dependencies.push(dependency);
        }
        self
    }

    pub fn build(mut self) -> Result<Job, ConfigError> {
        let n = self.tasks.len();
        let mut dependents = vec![Vec::new(); n];
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if !(task.flops >= 0. && task.flops.is_finite()) {
                return Err(invalid(&self.name, format!("task `{}` has invalid flops {}", task.name, task.flops)));
            }
            if task.cores == 0 {
                return Err(invalid(&self.name, format!("task `{}` requires zero cores", task.name)));
            }
            task.dependencies.sort_unstable();
            task.dependencies.dedup();
            for &dep in task.dependencies.iter() {
                if dep >= n {
                    return Err(invalid(&self.name, format!("task `{}` depends on unknown task {}", task.name, dep)));
                }
                if dep == i {
                    return Err(invalid(&self.name, format!("task `{}` depends on itself", task.name)));
                }
                dependents[dep].push(i);
            }
        }

        // Kahn's algorithm, smallest index first among the available tasks
        let mut in_degree = self.tasks.iter().map(|t| t.dependencies.len()).collect::<Vec<_>>();
        let mut queue = (0..n).filter(|&i| in_degree[i] == 0).collect::<VecDeque<_>>();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &next in dependents[i].iter() {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        if order.len() != n {
            let stuck = (0..n)
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.tasks[i].name.clone())
                .unwrap_or_default();
            return Err(invalid(&self.name, format!("dependency cycle through task `{}`", stuck)));
        }

        Ok(Job {
            name: self.name,
            tasks: self.tasks,
            dependents,
            topological_order: order,
        })
    }
}

fn invalid(job: &str, reason: String) -> ConfigError {
    ConfigError::InvalidJob {
        job: job.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Job {
        let mut b = Job::builder("diamond");
        let a = b.add_task(Task::new("a", 10.));
        let l = b.add_task(Task::new("l", 10.));
        let r = b.add_task(Task::new("r", 10.));
        let z = b.add_task(Task::new("z", 10.));
        b.add_dependency(a, l).add_dependency(a, r);
        b.add_dependency(l, z).add_dependency(r, z);
        b.build().unwrap()
    }

    #[test]
    fn links_mirror_dependencies() {
        let job = diamond();
        assert_eq!(job.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(job.dependents(0), &[1, 2]);
        assert_eq!(job.dependencies(3), &[1, 2]);
        assert_eq!(job.topological_order(), &[0, 1, 2, 3]);
    }

    #[test]
    fn rejects_bad_dependencies() {
        let mut b = Job::builder("self");
        let t = b.add_task(Task::new("t", 1.));
        b.add_dependency(t, t);
        assert!(matches!(b.build(), Err(ConfigError::InvalidJob { .. })));

        let mut b = Job::builder("unknown");
        let t = b.add_task(Task::new("t", 1.));
        b.add_dependency(7, t);
        assert!(matches!(b.build(), Err(ConfigError::InvalidJob { .. })));

        let mut b = Job::builder("cycle");
        let x = b.add_task(Task::new("x", 1.));
        let y = b.add_task(Task::new("y", 1.));
        b.add_dependency(x, y).add_dependency(y, x);
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn duplicate_dependencies_are_merged() {
        let mut b = Job::builder("dup");
        let x = b.add_task(Task::new("x", 1.));
        let y = b.add_task(Task::new("y", 1.));
        b.add_dependency(x, y).add_dependency(x, y);
        let job = b.build().unwrap();
        assert_eq!(job.dependencies(y), &[x]);
        assert_eq!(job.dependents(x), &[y]);
    }
}
