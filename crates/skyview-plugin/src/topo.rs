//! Dependency resolver: Kahn's topological sort over plugin ordering constraints.
//!
//! Ties between simultaneously ready nodes are broken by insertion order, so
//! identical input always yields the identical sequence. Edges whose endpoints
//! are not among the nodes are ignored; callers use this to resolve a subset
//! of plugins against the full constraint set.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// The constraint graph contained at least one cycle.
///
/// `nodes` lists, in insertion order, every node that sits on a cycle or on a
/// path between cycles. Nodes merely downstream of a cycle are not reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<I> {
    /// Nodes participating in the cycle(s).
    pub nodes: Vec<I>,
}

/// Nodes plus "runs before" edges, resolved on demand.
#[derive(Debug, Clone)]
pub struct DependencyGraph<I> {
    nodes: Vec<I>,
    edges: Vec<(I, I)>,
}

impl<I: Clone + Eq + Hash> DependencyGraph<I> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Appends a node. Insertion order is the tie-break order.
    pub fn add_node(&mut self, node: I) {
        self.nodes.push(node);
    }

    /// Records that `before` must run before `after`.
    pub fn add_edge(&mut self, before: I, after: I) {
        self.edges.push((before, after));
    }

    /// Returns the nodes in insertion order.
    pub fn nodes(&self) -> &[I] {
        &self.nodes
    }

    /// Returns the recorded edges.
    pub fn edges(&self) -> &[(I, I)] {
        &self.edges
    }

    /// Computes a total order consistent with every edge.
    pub fn resolve(&self) -> Result<Vec<I>, CycleError<I>> {
        order(&self.nodes, &self.edges)
    }
}

impl<I: Clone + Eq + Hash> Default for DependencyGraph<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders `nodes` so that for every `(a, b)` in `edges`, `a` precedes `b`.
///
/// Duplicate nodes are collapsed onto their first occurrence. A self edge
/// `(a, a)` is a cycle.
pub fn order<I>(nodes: &[I], edges: &[(I, I)]) -> Result<Vec<I>, CycleError<I>>
where
    I: Clone + Eq + Hash,
{
    let mut index: HashMap<&I, usize> = HashMap::with_capacity(nodes.len());
    let mut unique: Vec<&I> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !index.contains_key(node) {
            index.insert(node, unique.len());
            unique.push(node);
        }
    }

    let n = unique.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];

    for (from, to) in edges {
        let (Some(&from), Some(&to)) = (index.get(from), index.get(to)) else {
            continue;
        };
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut sorted = Vec::with_capacity(n);
    while let Some(Reverse(current)) = ready.pop() {
        sorted.push(current);
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if sorted.len() < n {
        let nodes = cyclic_members(&successors, &in_degree)
            .into_iter()
            .map(|i| unique[i].clone())
            .collect();
        return Err(CycleError { nodes });
    }

    Ok(sorted.into_iter().map(|i| unique[i].clone()).collect())
}

/// Narrows the unresolved remainder of Kahn's pass down to cycle members.
///
/// Every unresolved node still has a positive in-degree. Repeatedly peeling
/// off unresolved nodes with no unresolved successor removes those that only
/// hang off a cycle.
fn cyclic_members(successors: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let n = successors.len();
    let mut remaining: Vec<bool> = in_degree.iter().map(|degree| *degree > 0).collect();

    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut out_degree = vec![0usize; n];
    for (from, targets) in successors.iter().enumerate() {
        if !remaining[from] {
            continue;
        }
        for &to in targets {
            if remaining[to] {
                predecessors[to].push(from);
                out_degree[from] += 1;
            }
        }
    }

    let mut sinks: Vec<usize> = (0..n)
        .filter(|&i| remaining[i] && out_degree[i] == 0)
        .collect();
    while let Some(sink) = sinks.pop() {
        remaining[sink] = false;
        for &pred in &predecessors[sink] {
            out_degree[pred] -= 1;
            if out_degree[pred] == 0 && remaining[pred] {
                sinks.push(pred);
            }
        }
    }

    (0..n).filter(|&i| remaining[i]).collect()
}
