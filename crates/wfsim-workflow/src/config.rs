//! Policy identifiers and scheduler configuration.
//!
//! Policies are named with the `name[key=value,...]` syntax, e.g. `round-robin[quanta=2]`, and
//! resolved once into closed enums, from which the policy objects of a run are built.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policies::elop::{ElopJobAdmission, ElopResourceSelection, ReservationTable};
use crate::policies::heft::{HeftResourceSelection, HeftState, HeftTaskOrder};
use crate::policies::lottery::LotteryTaskOrder;
use crate::policies::round_robin::RoundRobinEligibility;
use crate::policies::simple::*;
use crate::policy::PolicySet;

/// Parsed `name[key=value,...]` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParams {
    name: String,
    params: BTreeMap<String, String>,
}

impl PolicyParams {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get<T: FromStr, K: AsRef<str>>(&self, name: K) -> Option<T> {
        self.params.get(name.as_ref()).and_then(|s| s.parse().ok())
    }

    /// Reads a required parameter, failing if it is missing or can't be parsed.
    fn require<T: FromStr>(&self, param: &str) -> Result<T, ConfigError> {
        let value = self.params.get(param).ok_or_else(|| self.invalid(param, "missing value"))?;
        value
            .parse()
            .map_err(|_| self.invalid(param, &format!("can't parse `{}`", value)))
    }

    /// Fails if there are parameters other than the listed ones.
    fn allow_only(&self, allowed: &[&str]) -> Result<(), ConfigError> {
        match self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(param) => Err(self.invalid(param, "unknown parameter")),
            None => Ok(()),
        }
    }

    fn invalid(&self, param: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidPolicyParam {
            policy: self.name.clone(),
            param: param.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for PolicyParams {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedPolicyId(s.to_string());
        let s = s.trim();
        let (name, params) = match s.find('[') {
            None => (s, BTreeMap::new()),
            Some(open) => {
                if !s.ends_with(']') {
                    return Err(malformed());
                }
                let mut params = BTreeMap::new();
                let inner = &s[open + 1..s.len() - 1];
                if !inner.trim().is_empty() {
                    for param in inner.split(',') {
                        let pos = param.find('=').ok_or_else(malformed)?;
                        params.insert(param[..pos].trim().to_string(), param[pos + 1..].trim().to_string());
                    }
                }
                (&s[..open], params)
            }
        };
        if name.is_empty() || name.contains(']') {
            return Err(malformed());
        }
        Ok(Self {
            name: name.to_string(),
            params,
        })
    }
}

impl fmt::Display for PolicyParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(
                f,
                "{}[{}]",
                self.name,
                self.params.iter().map(|(k, v)| format!("{k}={v}")).join(",")
            )
        }
    }
}

fn unknown(kind: &'static str, params: &PolicyParams) -> ConfigError {
    ConfigError::UnknownPolicy {
        kind,
        name: params.name().to_string(),
    }
}

fn positive<T: PartialOrd + Default>(params: &PolicyParams, param: &str, value: T) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(params.invalid(param, "must be positive"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobAdmissionKind {
    Null,
    Elop,
}

impl FromStr for JobAdmissionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        params.allow_only(&[])?;
        match params.name() {
            "null" => Ok(Self::Null),
            "elop" => Ok(Self::Elop),
            _ => Err(unknown("job admission", &params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOrderKind {
    SubmissionTime,
}

impl FromStr for JobOrderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        params.allow_only(&[])?;
        match params.name() {
            "submission-time" => Ok(Self::SubmissionTime),
            _ => Err(unknown("job order", &params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskEligibilityKind {
    Null,
    RoundRobin { quanta: usize },
}

impl FromStr for TaskEligibilityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        match params.name() {
            "null" => {
                params.allow_only(&[])?;
                Ok(Self::Null)
            }
            "round-robin" => {
                params.allow_only(&["quanta"])?;
                let quanta = positive(&params, "quanta", params.require("quanta")?)?;
                Ok(Self::RoundRobin { quanta })
            }
            _ => Err(unknown("task eligibility", &params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOrderKind {
    SubmissionTime,
    MinWorkload,
    MaxWorkload,
    Lottery { rounds: u32 },
    Heft,
}

impl FromStr for TaskOrderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        if params.name() == "lottery" {
            params.allow_only(&["rounds"])?;
            let rounds = positive(&params, "rounds", params.require("rounds")?)?;
            return Ok(Self::Lottery { rounds });
        }
        params.allow_only(&[])?;
        match params.name() {
            "submission-time" => Ok(Self::SubmissionTime),
            "min-workload" => Ok(Self::MinWorkload),
            "max-workload" => Ok(Self::MaxWorkload),
            "heft" => Ok(Self::Heft),
            _ => Err(unknown("task order", &params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceFilterKind {
    Functional,
}

impl FromStr for ResourceFilterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        params.allow_only(&[])?;
        match params.name() {
            "functional" => Ok(Self::Functional),
            _ => Err(unknown("resource filter", &params)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceSelectionKind {
    FirstFit,
    MinCompletionTime,
    Heft,
    Elop,
}

impl FromStr for ResourceSelectionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        params.allow_only(&[])?;
        match params.name() {
            "first-fit" => Ok(Self::FirstFit),
            "min-completion-time" => Ok(Self::MinCompletionTime),
            "heft" => Ok(Self::Heft),
            "elop" => Ok(Self::Elop),
            _ => Err(unknown("resource selection", &params)),
        }
    }
}

/// When scheduling cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SchedulerMode {
    /// A cycle runs right after every job arrival and task completion.
    Interactive,
    /// Cycles run only at multiples of `quantum` seconds.
    Batch { quantum: f64 },
}

impl Default for SchedulerMode {
    fn default() -> Self {
        Self::Interactive
    }
}

impl FromStr for SchedulerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        match params.name() {
            "interactive" => {
                params.allow_only(&[])?;
                Ok(Self::Interactive)
            }
            "batch" => {
                params.allow_only(&["quantum"])?;
                let quantum: f64 = params.require("quantum")?;
                if !(quantum > 0. && quantum.is_finite()) {
                    return Err(params.invalid("quantum", "must be positive"));
                }
                Ok(Self::Batch { quantum })
            }
            _ => Err(unknown("scheduler mode", &params)),
        }
    }
}

impl TryFrom<String> for SchedulerMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SchedulerMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Batch { quantum } => write!(f, "batch[quantum={}]", quantum),
        }
    }
}

impl From<SchedulerMode> for String {
    fn from(mode: SchedulerMode) -> Self {
        mode.to_string()
    }
}

/// Full description of a scheduler: one policy per stage plus the cycle mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub job_admission: JobAdmissionKind,
    pub job_order: JobOrderKind,
    pub task_eligibility: TaskEligibilityKind,
    pub task_order: TaskOrderKind,
    pub resource_filter: ResourceFilterKind,
    pub resource_selection: ResourceSelectionKind,
    pub mode: SchedulerMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_admission: JobAdmissionKind::Null,
            job_order: JobOrderKind::SubmissionTime,
            task_eligibility: TaskEligibilityKind::Null,
            task_order: TaskOrderKind::SubmissionTime,
            resource_filter: ResourceFilterKind::Functional,
            resource_selection: ResourceSelectionKind::FirstFit,
            mode: SchedulerMode::Interactive,
        }
    }
}

impl SchedulerConfig {
    pub fn with_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Rejects combinations where a policy depends on state that only its partner maintains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_order == TaskOrderKind::Heft && self.resource_selection != ResourceSelectionKind::Heft {
            return Err(ConfigError::InconsistentPolicies(
                "heft task order requires heft resource selection".to_string(),
            ));
        }
        if self.resource_selection == ResourceSelectionKind::Elop && self.job_admission != JobAdmissionKind::Elop {
            return Err(ConfigError::InconsistentPolicies(
                "elop resource selection requires elop job admission".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates fresh policy objects for one run.
    ///
    /// `seed` feeds the random policies.
    pub fn build_policies(&self, seed: u64) -> Result<PolicySet, ConfigError> {
        self.validate()?;
        let heft = Rc::new(RefCell::new(HeftState::new()));
        let reservations = Rc::new(RefCell::new(ReservationTable::new()));
        Ok(PolicySet {
            job_admission: match self.job_admission {
                JobAdmissionKind::Null => Box::new(NullJobAdmission),
                JobAdmissionKind::Elop => Box::new(ElopJobAdmission::new(reservations.clone())),
            },
            job_order: match self.job_order {
                JobOrderKind::SubmissionTime => Box::new(SubmissionTimeJobOrder),
            },
            task_eligibility: match self.task_eligibility {
                TaskEligibilityKind::Null => Box::new(NullTaskEligibility),
                TaskEligibilityKind::RoundRobin { quanta } => Box::new(RoundRobinEligibility::new(quanta)),
            },
            task_order: match self.task_order {
                TaskOrderKind::SubmissionTime => Box::new(SubmissionTimeTaskOrder),
                TaskOrderKind::MinWorkload => Box::new(WorkloadTaskOrder::min()),
                TaskOrderKind::MaxWorkload => Box::new(WorkloadTaskOrder::max()),
                TaskOrderKind::Lottery { rounds } => Box::new(LotteryTaskOrder::new(rounds, seed)),
                TaskOrderKind::Heft => Box::new(HeftTaskOrder::new(heft.clone())),
            },
            resource_filter: match self.resource_filter {
                ResourceFilterKind::Functional => Box::new(FunctionalResourceFilter),
            },
            resource_selection: match self.resource_selection {
                ResourceSelectionKind::FirstFit => Box::new(FirstFitResourceSelection),
                ResourceSelectionKind::MinCompletionTime => Box::new(MinCompletionTimeResourceSelection),
                ResourceSelectionKind::Heft => Box::new(HeftResourceSelection::new(heft)),
                ResourceSelectionKind::Elop => Box::new(ElopResourceSelection::new(reservations)),
            },
        })
    }
}

/// Named policy combinations compared in experiments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AllocationPolicy {
    FirstFit,
    MinMin,
    MaxMin,
    RoundRobin { quanta: usize },
    Lottery { rounds: u32 },
    Heft,
    Elop,
}

impl AllocationPolicy {
    /// Policy set of the preset, with interactive cycles.
    pub fn config(&self) -> SchedulerConfig {
        let base = SchedulerConfig::default();
        match *self {
            Self::FirstFit => base,
            Self::MinMin => SchedulerConfig {
                task_order: TaskOrderKind::MinWorkload,
                resource_selection: ResourceSelectionKind::MinCompletionTime,
                ..base
            },
            Self::MaxMin => SchedulerConfig {
                task_order: TaskOrderKind::MaxWorkload,
                resource_selection: ResourceSelectionKind::MinCompletionTime,
                ..base
            },
            Self::RoundRobin { quanta } => SchedulerConfig {
                task_eligibility: TaskEligibilityKind::RoundRobin { quanta },
                ..base
            },
            Self::Lottery { rounds } => SchedulerConfig {
                task_order: TaskOrderKind::Lottery { rounds },
                ..base
            },
            Self::Heft => SchedulerConfig {
                task_order: TaskOrderKind::Heft,
                resource_selection: ResourceSelectionKind::Heft,
                ..base
            },
            Self::Elop => SchedulerConfig {
                job_admission: JobAdmissionKind::Elop,
                resource_selection: ResourceSelectionKind::Elop,
                ..base
            },
        }
    }
}

impl FromStr for AllocationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params: PolicyParams = s.parse()?;
        match params.name() {
            "round-robin" => {
                params.allow_only(&["quanta"])?;
                let quanta = positive(&params, "quanta", params.require("quanta")?)?;
                return Ok(Self::RoundRobin { quanta });
            }
            "lottery" => {
                params.allow_only(&["rounds"])?;
                let rounds = positive(&params, "rounds", params.require("rounds")?)?;
                return Ok(Self::Lottery { rounds });
            }
            _ => {}
        }
        params.allow_only(&[])?;
        match params.name() {
            "first-fit" => Ok(Self::FirstFit),
            "min-min" => Ok(Self::MinMin),
            "max-min" => Ok(Self::MaxMin),
            "heft" => Ok(Self::Heft),
            "elop" => Ok(Self::Elop),
            _ => Err(unknown("allocation", &params)),
        }
    }
}

impl TryFrom<String> for AllocationPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FirstFit => write!(f, "first-fit"),
            Self::MinMin => write!(f, "min-min"),
            Self::MaxMin => write!(f, "max-min"),
            Self::RoundRobin { quanta } => write!(f, "round-robin[quanta={}]", quanta),
            Self::Lottery { rounds } => write!(f, "lottery[rounds={}]", rounds),
            Self::Heft => write!(f, "heft"),
            Self::Elop => write!(f, "elop"),
        }
    }
}

impl From<AllocationPolicy> for String {
    fn from(policy: AllocationPolicy) -> Self {
        policy.to_string()
    }
}
