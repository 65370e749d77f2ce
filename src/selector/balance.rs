//! Load balancers: pick one node from a resolved list.
//!
//! Four strategies ship with the crate, registered by name with random as
//! the sentinel default. Round-robin and weighted round-robin keep a
//! per-service picker that refreshes after three minutes or whenever the
//! node list changes length; picker state sits behind a small critical
//! section so distribution under concurrency is best-effort but never
//! corrupt.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use rand::Rng;

use super::Node;
use crate::registry::Registry;

pub const RANDOM: &str = "random";
pub const ROUND_ROBIN: &str = "roundRobin";
pub const WEIGHTED_ROUND_ROBIN: &str = "weightedRoundRobin";
pub const CONSISTENT_HASH: &str = "consistentHash";

/// Time after which a per-service picker resets its cursor state.
const REFRESH_DURATION: Duration = Duration::from_secs(3 * 60);

/// Virtual points per node on the consistent-hash ring.
const RING_REPLICAS: usize = 32;

/// Pick one node for a service from a non-empty candidate list.
pub trait Balancer: Send + Sync {
    fn balance(&self, service_name: &str, nodes: &[Node]) -> Option<Node>;
}

/// Uniform random choice.
pub struct RandomBalancer;

impl Balancer for RandomBalancer {
    fn balance(&self, _service_name: &str, nodes: &[Node]) -> Option<Node> {
        if nodes.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..nodes.len());
        Some(nodes[idx].clone())
    }
}

struct RoundRobinPicker {
    length: usize,
    last_update: Instant,
    last_index: usize,
}

impl RoundRobinPicker {
    fn new(length: usize) -> Self {
        Self { length, last_update: Instant::now(), last_index: 0 }
    }

    fn pick(&mut self, nodes: &[Node]) -> Node {
        if self.last_update.elapsed() > REFRESH_DURATION || nodes.len() != self.length {
            self.length = nodes.len();
            self.last_update = Instant::now();
            self.last_index = 0;
        }

        self.last_index = (self.last_index + 1) % nodes.len();
        nodes[self.last_index].clone()
    }
}

/// Cyclic distribution, one per-service cursor.
pub struct RoundRobinBalancer {
    pickers: Mutex<HashMap<String, RoundRobinPicker>>,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self { pickers: Mutex::new(HashMap::new()) }
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for RoundRobinBalancer {
    fn balance(&self, service_name: &str, nodes: &[Node]) -> Option<Node> {
        if nodes.is_empty() {
            return None;
        }
        let mut pickers = self.pickers.lock().unwrap();
        let picker = pickers
            .entry(service_name.to_string())
            .or_insert_with(|| RoundRobinPicker::new(nodes.len()));
        Some(picker.pick(nodes))
    }
}

struct WeightedNode {
    node: Node,
    weight: i32,
    current_weight: i32,
}

struct WeightedPicker {
    nodes: Vec<WeightedNode>,
    last_update: Instant,
}

impl WeightedPicker {
    fn new(nodes: &[Node]) -> Self {
        Self { nodes: Self::weighted(nodes), last_update: Instant::now() }
    }

    fn weighted(nodes: &[Node]) -> Vec<WeightedNode> {
        nodes
            .iter()
            .map(|n| WeightedNode {
                node: n.clone(),
                weight: n.weight,
                current_weight: n.weight,
            })
            .collect()
    }

    /// Smooth weighted round-robin: every node gains its weight, the
    /// current maximum is chosen and pays the total back.
    fn pick(&mut self, nodes: &[Node]) -> Node {
        if self.last_update.elapsed() > REFRESH_DURATION || nodes.len() != self.nodes.len() {
            self.nodes = Self::weighted(nodes);
            self.last_update = Instant::now();
        }

        let mut total_weight = 0;
        let mut max_weight = i32::MIN;
        let mut index = 0;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.current_weight += node.weight;
            total_weight += node.weight;
            if node.current_weight > max_weight {
                max_weight = node.current_weight;
                index = i;
            }
        }

        self.nodes[index].current_weight -= total_weight;
        self.nodes[index].node.clone()
    }
}

/// Smooth weighted round-robin, one per-service weight table.
pub struct WeightedRoundRobinBalancer {
    pickers: Mutex<HashMap<String, WeightedPicker>>,
}

impl WeightedRoundRobinBalancer {
    pub fn new() -> Self {
        Self { pickers: Mutex::new(HashMap::new()) }
    }
}

impl Default for WeightedRoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for WeightedRoundRobinBalancer {
    fn balance(&self, service_name: &str, nodes: &[Node]) -> Option<Node> {
        if nodes.is_empty() {
            return None;
        }
        let mut pickers = self.pickers.lock().unwrap();
        let picker = pickers
            .entry(service_name.to_string())
            .or_insert_with(|| WeightedPicker::new(nodes));
        Some(picker.pick(nodes))
    }
}

struct HashRing {
    points: BTreeMap<u64, usize>,
    keys: Vec<String>,
}

impl HashRing {
    fn build(nodes: &[Node]) -> Self {
        let mut points = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            for replica in 0..RING_REPLICAS {
                points.insert(hash_of(&(&node.key, replica)), idx);
            }
        }
        Self { points, keys: nodes.iter().map(|n| n.key.clone()).collect() }
    }

    fn matches(&self, nodes: &[Node]) -> bool {
        self.keys.len() == nodes.len()
            && self.keys.iter().zip(nodes).all(|(k, n)| *k == n.key)
    }

    /// First point clockwise from the fingerprint, wrapping at the end.
    fn locate(&self, fingerprint: u64) -> Option<usize> {
        self.points
            .range(fingerprint..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, idx)| *idx)
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Consistent hashing over a virtual-node ring keyed by the request's
/// service fingerprint.
pub struct ConsistentHashBalancer {
    rings: Mutex<HashMap<String, HashRing>>,
}

impl ConsistentHashBalancer {
    pub fn new() -> Self {
        Self { rings: Mutex::new(HashMap::new()) }
    }
}

impl Default for ConsistentHashBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for ConsistentHashBalancer {
    fn balance(&self, service_name: &str, nodes: &[Node]) -> Option<Node> {
        if nodes.is_empty() {
            return None;
        }
        let mut rings = self.rings.lock().unwrap();
        let ring = rings
            .entry(service_name.to_string())
            .and_modify(|r| {
                if !r.matches(nodes) {
                    *r = HashRing::build(nodes);
                }
            })
            .or_insert_with(|| HashRing::build(nodes));

        let idx = ring.locate(hash_of(&service_name))?;
        Some(nodes[idx].clone())
    }
}

static BALANCERS: Lazy<Registry<dyn Balancer>> = Lazy::new(|| {
    let registry: Registry<dyn Balancer> = Registry::new(RANDOM, Arc::new(RandomBalancer));
    registry.register(ROUND_ROBIN, Arc::new(RoundRobinBalancer::new()));
    registry.register(WEIGHTED_ROUND_ROBIN, Arc::new(WeightedRoundRobinBalancer::new()));
    registry.register(CONSISTENT_HASH, Arc::new(ConsistentHashBalancer::new()));
    registry
});

/// Register a balancer under a name, replacing any prior entry.
pub fn register(name: impl Into<String>, balancer: Arc<dyn Balancer>) {
    BALANCERS.register(name, balancer);
}

/// Look up a balancer by name; unknown names get random.
pub fn get(name: &str) -> Arc<dyn Balancer> {
    BALANCERS.get(name)
}
