//! Synthetic weighted graphs. All generators are O(n + edges),
//! single-threaded and deterministic.

use std::collections::VecDeque;

use route_search_core::Weight;
use serde::Serialize;

pub type Edge = (u32, u32, Weight);

/// Graph topology to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Lsystem,
    Scalefree,
    Smallworld,
    Random,
    Barbell,
    Dla,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Lsystem,
        Shape::Scalefree,
        Shape::Smallworld,
        Shape::Random,
        Shape::Barbell,
        Shape::Dla,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Shape::Lsystem => "L-system tree",
            Shape::Scalefree => "Scale-free (edge sampling)",
            Shape::Smallworld => "Small-world (Watts-Strogatz)",
            Shape::Random => "Erdos-Renyi random",
            Shape::Barbell => "Barbell (clique-bridge-clique)",
            Shape::Dla => "DLA (organic branching)",
        }
    }

    pub fn generate(self, node_count: u32) -> Vec<Edge> {
        match self {
            Shape::Lsystem => gen_lsystem(node_count),
            Shape::Scalefree => gen_scale_free(node_count),
            Shape::Smallworld => gen_small_world(node_count),
            Shape::Random => gen_random(node_count),
            Shape::Barbell => gen_barbell(node_count),
            Shape::Dla => gen_dla(node_count),
        }
    }
}

/// Simple LCG for deterministic, fast pseudo-random numbers.
struct FastRng(u64);

impl FastRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self, max: u32) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) % max as u64) as u32
    }

    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Edge weight in `1..=9`.
    fn weight(&mut self) -> Weight {
        self.next(9) as Weight + 1
    }
}

/// Every node spawns three children: log depth, exponential width.
fn gen_lsystem(node_count: u32) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(node_count as usize);
    let mut rng = FastRng::new(42);
    let branching = 3;

    let mut next_id = 1;
    let mut frontier = vec![0u32];
    while next_id < node_count && !frontier.is_empty() {
        let mut next_frontier = Vec::with_capacity(frontier.len() * branching);
        for &parent in &frontier {
            for _ in 0..branching {
                if next_id >= node_count {
                    break;
                }
                edges.push((parent, next_id, rng.weight()));
                next_frontier.push(next_id);
                next_id += 1;
            }
        }
        frontier = next_frontier;
    }
    edges
}

/// Preferential attachment by sampling endpoints of existing edges, so
/// well-connected nodes keep attracting new ones.
fn gen_scale_free(node_count: u32) -> Vec<Edge> {
    let per_node = 10;
    let mut edges = Vec::with_capacity(node_count as usize * per_node as usize);
    let mut endpoints: Vec<u32> = Vec::with_capacity(edges.capacity() * 2);
    let mut rng = FastRng::new(12345);

    let seed = 5.min(node_count);
    for i in 0..seed {
        for j in (i + 1)..seed {
            edges.push((i, j, rng.weight()));
            endpoints.extend([i, j]);
        }
    }

    for node in seed..node_count {
        for _ in 0..per_node.min(node) {
            if endpoints.is_empty() {
                break;
            }
            let target = endpoints[rng.next(endpoints.len() as u32) as usize];
            if target != node {
                edges.push((node, target, rng.weight()));
                endpoints.extend([node, target]);
            }
        }
    }
    edges
}

/// Ring lattice with `k` forward neighbours, each edge rewired with
/// probability `p`. High clustering, short paths.
fn gen_small_world(node_count: u32) -> Vec<Edge> {
    let k = 10;
    let p = 0.05;
    let mut edges = Vec::with_capacity(node_count as usize * k as usize);
    let mut rng = FastRng::new(67890);
    if node_count < 2 {
        return edges;
    }

    for i in 0..node_count {
        for j in 1..=k {
            let neighbor = (i + j) % node_count;
            let target = if rng.next_f64() < p {
                let rewired = rng.next(node_count);
                if rewired != i {
                    rewired
                } else {
                    neighbor
                }
            } else {
                neighbor
            };
            edges.push((i, target, rng.weight()));
        }
    }
    edges
}

/// Uniform random edges, about ten per node.
fn gen_random(node_count: u32) -> Vec<Edge> {
    let target = node_count as usize * 10;
    let mut edges = Vec::with_capacity(target);
    let mut rng = FastRng::new(54321);
    if node_count == 0 {
        return edges;
    }

    for _ in 0..target {
        let from = rng.next(node_count);
        let to = rng.next(node_count);
        if from != to {
            edges.push((from, to, rng.weight()));
        }
    }
    edges
}

/// Two dense cliques joined by a ten-node bridge; every route between them
/// squeezes through the bottleneck.
fn gen_barbell(node_count: u32) -> Vec<Edge> {
    let bridge_len = 10;
    let clique = node_count.saturating_sub(bridge_len) / 2;
    let mut edges = Vec::with_capacity(clique as usize * 40 + bridge_len as usize);
    let mut rng = FastRng::new(99999);
    if clique < 2 {
        return edges;
    }

    let b_start = clique + bridge_len;
    for base in [0, b_start] {
        for i in 0..clique {
            for _ in 0..20.min(clique - 1) {
                let target = rng.next(clique);
                if target != i {
                    edges.push((base + i, base + target, rng.weight()));
                }
            }
        }
    }

    // Last node of A, through the bridge, to the first node of B.
    for id in clique..=b_start {
        edges.push((id - 1, id, rng.weight()));
    }
    edges
}

/// Each new node sticks to a random recent "surface" node, with an
/// occasional second edge creating loops.
fn gen_dla(node_count: u32) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(node_count as usize * 2);
    let mut rng = FastRng::new(77777);

    let surface_max = 10_000;
    let mut surface: VecDeque<u32> = VecDeque::with_capacity(surface_max + 1);
    surface.push_back(0);

    for node in 1..node_count {
        let attach_to = surface[rng.next(surface.len() as u32) as usize];
        edges.push((node, attach_to, rng.weight()));

        if rng.next(10) == 0 && node > 1 {
            let other = rng.next(node);
            if other != attach_to {
                edges.push((node, other, rng.weight()));
            }
        }

        surface.push_back(node);
        if surface.len() > surface_max {
            surface.pop_front();
        }
    }
    edges
}
