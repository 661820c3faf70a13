// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution ordering.
//!
//! Nodes touched by at least one link are ranked so that every link goes
//! from a lower to a higher rank. Independent nodes keep their previous
//! relative order, falling back to insertion order. Nodes without links get
//! `EXCLUDED_RANK` and are never executed.

use crate::graph::Graph;
use crate::node::{Node, NodeId, EXCLUDED_RANK};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

/// One entry of a compute order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeEntry {
    /// Node to execute
    pub node: NodeId,
    /// Rank of the node, `EXCLUDED_RANK` when skipped
    pub rank: i32,
    /// Subgraph to dispatch into instead of invoking the node
    pub subgraph: Option<String>,
}

impl ComputeEntry {
    /// Whether the entry is executed
    pub fn is_scheduled(&self) -> bool {
        self.rank >= 0
    }
}

/// Error when the graph contains a cycle
#[derive(Debug, Clone, Error)]
#[error("Graph contains a cycle through {} node(s)", .nodes.len())]
pub struct CycleError {
    /// Nodes that could not be ordered
    pub nodes: Vec<NodeId>,
}

/// Subgraph an entry for `node` should dispatch into, if the graph knows it
pub fn subgraph_tag(graph: &Graph, node: &Node) -> Option<String> {
    let name = node.subgraph()?;
    if graph.subgraph(name).is_some() {
        Some(name.to_string())
    } else {
        tracing::warn!("Node {} references unknown subgraph `{}`", node.id, name);
        None
    }
}

/// Compute the execution order of `graph`, sorted by ascending rank
pub fn compute_order(graph: &Graph) -> Result<Vec<ComputeEntry>, CycleError> {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    let position: HashMap<NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut active = vec![false; ids.len()];
    let mut in_degree = vec![0usize; ids.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];

    for (from, node) in graph.nodes().enumerate() {
        for link in node.outgoing_links() {
            active[from] = true;
            // Dangling destinations keep the source scheduled but add no edge
            let Some(&to) = position.get(&link.to.node) else {
                continue;
            };
            active[to] = true;
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    // Previous rank first, insertion order second
    let key = |index: usize| -> (i32, usize) {
        let rank = graph
            .node(ids[index])
            .map_or(EXCLUDED_RANK, |n| n.compute_rank);
        (if rank < 0 { i32::MAX } else { rank }, index)
    };

    let mut ready: BinaryHeap<Reverse<(i32, usize)>> = (0..ids.len())
        .filter(|&i| active[i] && in_degree[i] == 0)
        .map(|i| Reverse(key(i)))
        .collect();

    let mut ranked = Vec::new();
    while let Some(Reverse((_, index))) = ready.pop() {
        ranked.push(index);
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(key(next)));
            }
        }
    }

    let active_count = active.iter().filter(|a| **a).count();
    if ranked.len() < active_count {
        let nodes = (0..ids.len())
            .filter(|&i| active[i] && in_degree[i] > 0)
            .map(|i| ids[i])
            .collect();
        return Err(CycleError { nodes });
    }

    let mut order: Vec<ComputeEntry> = (0..ids.len())
        .filter(|&i| !active[i])
        .map(|i| ComputeEntry {
            node: ids[i],
            rank: EXCLUDED_RANK,
            subgraph: None,
        })
        .collect();

    for (rank, index) in ranked.into_iter().enumerate() {
        let subgraph = graph.node(ids[index]).and_then(|n| subgraph_tag(graph, n));
        order.push(ComputeEntry {
            node: ids[index],
            rank: rank as i32,
            subgraph,
        });
    }

    Ok(order)
}
