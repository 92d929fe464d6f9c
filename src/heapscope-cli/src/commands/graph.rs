//! Graph command handler
//!
//! Walks the heap with the pointer scan on, then exports everything
//! reachable from the seed blocks.

use super::target::Target;
use crate::cli::{BoundsArgs, GraphFormat, TargetArgs};
use crate::config::Config;

use anyhow::{bail, Context, Result};
use heapscope::{build_graph, AnalysisOptions, HeapBlocks, HeapGraph};
use std::fs;
use std::path::Path;

pub fn handle(
    target: &TargetArgs,
    bounds: &BoundsArgs,
    seeds: &[u64],
    max_nodes: Option<usize>,
    format: GraphFormat,
    output: Option<&Path>,
) -> Result<()> {
    let config = Config::load()?;
    let options = AnalysisOptions {
        min_string_length: config.min_string_length,
        scan_pointers: true,
    };

    let target = Target::open(target)?;
    let analysis = target.analyze(bounds, &options)?;

    let graph = seeded_graph(
        &analysis.blocks,
        seeds,
        max_nodes.unwrap_or(config.max_graph_nodes),
    )?;
    let rendered = render(&graph, format)?;

    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} nodes and {} edges to {}",
                graph.node_count(),
                graph.edge_count(),
                path.display()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Build the graph, refusing seeds that are not block addresses
fn seeded_graph(blocks: &HeapBlocks, seeds: &[u64], max_nodes: usize) -> Result<HeapGraph> {
    let unknown: Vec<String> = seeds
        .iter()
        .filter(|&&seed| blocks.find(seed).is_none())
        .map(|seed| format!("{:#x}", seed))
        .collect();
    if !unknown.is_empty() {
        bail!(
            "Not block addresses: {}. Use `heapscope walk` to list blocks.",
            unknown.join(", ")
        );
    }

    Ok(build_graph(blocks, seeds, max_nodes)?)
}

fn render(graph: &HeapGraph, format: GraphFormat) -> Result<String> {
    Ok(match format {
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Json => serde_json::to_string_pretty(graph)? + "\n",
    })
}
