//! Compute nodes and the pool that tracks which of them are free.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PoolError};
use crate::job::Task;

/// Index of a node in its [`ResourcePool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compute node.
///
/// Described by the number of CPU cores, the speed of one core in flop/s and the amount of memory.
/// A node runs at most one task at a time.
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub cores: u32,
    pub speed: f64,
    pub memory: u64,
}

impl Node {
    /// Time in seconds that the task takes on this node.
    pub fn runtime(&self, task: &Task) -> f64 {
        task.flops / (self.speed * task.cores.max(1) as f64)
    }

    /// Whether the node has enough cores and memory for the task.
    pub fn fits(&self, task: &Task) -> bool {
        self.cores >= task.cores && self.memory >= task.memory
    }
}

/// Node description as found in topology files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Speed of one core in flop/s.
    pub speed: f64,
    pub cores: u32,
    /// Memory in MB.
    #[serde(default)]
    pub memory: u64,
    /// Number of identical nodes described by this entry.
    #[serde(default)]
    pub count: Option<usize>,
}

impl NodeConfig {
    pub fn new(name: &str, speed: f64, cores: u32, memory: u64) -> Self {
        Self {
            name: name.to_string(),
            speed,
            cores,
            memory,
            count: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Topology {
    nodes: Vec<NodeConfig>,
}

/// Loads node descriptions from a YAML topology file.
///
/// Topology file example:
///
/// ```yaml
/// nodes:
///   - name: fast
///     speed: 4.1e9
///     cores: 4
///     memory: 16000
///   - name: slow
///     speed: 3.5e9
///     cores: 2
///     memory: 16000
///     count: 8
/// ```
pub fn load_nodes<P: AsRef<Path>>(path: P) -> Result<Vec<NodeConfig>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let topology: Topology = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(topology.nodes)
}

/// The set of nodes available to one scheduler, with their free/busy state.
///
/// Nodes are never added or removed after construction. Free nodes are reported in id order, so
/// policies that pick "the first" node are deterministic.
pub struct ResourcePool {
    nodes: Vec<Node>,
    available: BTreeSet<NodeId>,
}

impl ResourcePool {
    /// Creates a pool with every node free, expanding `count` replicas as `name-0`, `name-1`, ...
    pub fn new(configs: &[NodeConfig]) -> Result<Self, ConfigError> {
        let mut nodes = Vec::new();
        for config in configs.iter() {
            if config.speed <= 0. || !config.speed.is_finite() {
                return Err(ConfigError::InvalidNode {
                    node: config.name.clone(),
                    reason: format!("speed must be positive, got {}", config.speed),
                });
            }
            if config.cores == 0 {
                return Err(ConfigError::InvalidNode {
                    node: config.name.clone(),
                    reason: "node must have at least one core".to_string(),
                });
            }
            let names = match config.count {
                None => vec![config.name.clone()],
                Some(count) => (0..count).map(|i| format!("{}-{}", config.name, i)).collect(),
            };
            for name in names.into_iter() {
                nodes.push(Node {
                    id: NodeId(nodes.len()),
                    name,
                    cores: config.cores,
                    speed: config.speed,
                    memory: config.memory,
                });
            }
        }
        if nodes.is_empty() {
            return Err(ConfigError::EmptyTopology);
        }
        let available = nodes.iter().map(|node| node.id).collect();
        Ok(Self { nodes, available })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Free nodes in id order.
    pub fn available_nodes(&self) -> Vec<NodeId> {
        self.available.iter().copied().collect()
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn is_available(&self, id: NodeId) -> bool {
        self.available.contains(&id)
    }

    /// Marks the node as busy.
    pub fn reserve(&mut self, id: NodeId) -> Result<(), PoolError> {
        if !self.contains(id) {
            return Err(PoolError::UnknownNode(id));
        }
        if !self.available.remove(&id) {
            return Err(PoolError::NodeBusy(id));
        }
        Ok(())
    }

    /// Marks the node as free again.
    pub fn release(&mut self, id: NodeId) -> Result<(), PoolError> {
        if !self.contains(id) {
            return Err(PoolError::UnknownNode(id));
        }
        if !self.available.insert(id) {
            return Err(PoolError::NodeNotBusy(id));
        }
        Ok(())
    }

    /// Mean time to execute one flop on a single core, over all nodes.
    pub fn avg_flop_time(&self) -> f64 {
        self.nodes.iter().map(|node| 1. / node.speed).sum::<f64>() / self.nodes.len() as f64
    }
}
