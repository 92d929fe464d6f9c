//! Reachability graph export.
//!
//! Starting from a set of seed blocks, follows `points_to` links and collects
//! every reachable block. The result is a plain nodes + edges structure; any
//! layout or rendering happens elsewhere.

use crate::block::{BlockState, HeapBlocks};
use crate::error::{HeapError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write;

/// Node limit used when the caller has no preference
pub const DEFAULT_MAX_NODES: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub address: u64,
    pub state: BlockState,
}

/// Directed graph of blocks reachable from the seeds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeapGraph {
    /// Nodes keyed by block address
    pub nodes: BTreeMap<u64, GraphNode>,
    /// Deduplicated `(from, to)` pairs
    pub edges: BTreeSet<(u64, u64)>,
}

impl HeapGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Render as Graphviz DOT; busy blocks are green, everything else red
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph heap {\n");

        for node in self.nodes.values() {
            let color = if node.state == BlockState::Busy {
                "green"
            } else {
                "red"
            };
            let _ = writeln!(
                out,
                "    \"{:#x}\" [style=filled, fillcolor={}];",
                node.address, color
            );
        }

        for (from, to) in &self.edges {
            let _ = writeln!(out, "    \"{:#x}\" -> \"{:#x}\";", from, to);
        }

        out.push_str("}\n");
        out
    }
}

/// Collect the blocks reachable from `seeds`
///
/// Seeds that are not block addresses are ignored. Fails with
/// [`HeapError::GraphTooLarge`] instead of returning a partial graph.
pub fn build_graph(blocks: &HeapBlocks, seeds: &[u64], max_nodes: usize) -> Result<HeapGraph> {
    let mut stack: Vec<u64> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for &seed in seeds {
        if blocks.find(seed).is_some() && seen.insert(seed) {
            stack.push(seed);
        }
    }

    let mut graph = HeapGraph::default();

    while let Some(address) = stack.pop() {
        let Some(block) = blocks.find(address) else {
            continue;
        };

        if graph.nodes.len() == max_nodes {
            tracing::debug!("Too many nodes, limit is {}", max_nodes);
            return Err(HeapError::GraphTooLarge {
                nodes: max_nodes + 1,
                limit: max_nodes,
            });
        }

        graph.nodes.insert(
            address,
            GraphNode {
                address,
                state: block.state,
            },
        );

        for &target in &block.points_to {
            if blocks.find(target).is_none() {
                continue;
            }
            graph.edges.insert((address, target));
            if seen.insert(target) {
                stack.push(target);
            }
        }
    }

    tracing::debug!(
        "Graph has {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}
