//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors detected while setting up a run: bad inputs or an impossible policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} policy `{name}`")]
    UnknownPolicy { kind: &'static str, name: String },

    #[error("invalid parameter `{param}` for policy `{policy}`: {reason}")]
    InvalidPolicyParam {
        policy: String,
        param: String,
        reason: String,
    },

    #[error("can't parse policy identifier `{0}`")]
    MalformedPolicyId(String),

    #[error("inconsistent policy set: {0}")]
    InconsistentPolicies(String),

    #[error("can't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid job `{job}`: {reason}")]
    InvalidJob { job: String, reason: String },

    #[error("trace is not sorted by arrival time: job `{job}` arrives at {time} ms after {previous} ms")]
    UnsortedTrace { job: String, time: i64, previous: i64 },

    #[error("arrival time {time} ms of job `{job}` is in the past")]
    ArrivalInPast { job: String, time: i64 },

    #[error("topology has no nodes")]
    EmptyTopology,

    #[error("invalid node `{node}`: {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("task `{task}` of job `{job}` fits on no node")]
    UnplaceableTask { job: String, task: String },
}

/// Fatal errors of a run.
///
/// Either a policy or the scheduler itself broke an invariant and the run was aborted, or the run
/// ended with jobs that could never finish under the chosen policies.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("invariant violation: {reason}; state: {dump}")]
    InvariantViolation { reason: String, dump: serde_json::Value },

    #[error("no events left while {unfinished} jobs are unfinished; state: {dump}")]
    Stalled { unfinished: usize, dump: serde_json::Value },
}

/// Misuse of the [resource pool](crate::node::ResourcePool).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("node {0} does not exist")]
    UnknownNode(crate::node::NodeId),

    #[error("node {0} is not available")]
    NodeBusy(crate::node::NodeId),

    #[error("node {0} is not in use")]
    NodeNotBusy(crate::node::NodeId),
}

/// Failure of a single simulation run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
