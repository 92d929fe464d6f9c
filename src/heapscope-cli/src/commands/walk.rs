//! Walk command handler
//!
//! Prints one row per heap block, or the whole analysis as JSON.

use super::target::Target;
use crate::cli::{BoundsArgs, TargetArgs};
use crate::config::Config;

use anyhow::Result;
use heapscope::{AnalysisOptions, BlockRecord, BlockState, ChunkLayout, HeapAnalysis, WalkEnd};

/// Longest annotation shown in a table row
const MAX_DATA_WIDTH: usize = 96;

pub fn handle(
    target: &TargetArgs,
    bounds: &BoundsArgs,
    min_string: Option<usize>,
    no_pointers: bool,
    json: bool,
) -> Result<()> {
    let config = Config::load()?;
    let options = AnalysisOptions {
        min_string_length: min_string.unwrap_or(config.min_string_length),
        scan_pointers: config.scan_pointers && !no_pointers,
    };

    let target = Target::open(target)?;
    let analysis = target.analyze(bounds, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_table(&analysis);
    }

    Ok(())
}

fn print_table(analysis: &HeapAnalysis) {
    let width = address_width(analysis.layout);
    println!(
        "{:<width$} {:>10}  {:<5} DATA",
        "ADDRESS",
        "SIZE",
        "STATE",
        width = width
    );
    for block in &analysis.blocks {
        println!("{}", format_row(block, analysis.layout));
    }
    println!();
    println!("{}", summary(analysis));
}

/// Width of a `0x`-prefixed, zero-padded address for this layout
fn address_width(layout: ChunkLayout) -> usize {
    layout.word_size() * 2 + 2
}

fn format_row(block: &BlockRecord, layout: ChunkLayout) -> String {
    let data = block.annotation.to_string();
    format!(
        "{:#0width$x} {:>#10x}  {:<5} {}",
        block.address,
        block.size,
        block.state,
        truncate(&data, MAX_DATA_WIDTH),
        width = address_width(layout)
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn summary(analysis: &HeapAnalysis) -> String {
    let count = |state: BlockState| analysis.blocks.iter().filter(|b| b.state == state).count();
    let mut line = format!(
        "{} blocks ({} busy, {} free) in {:#x}..{:#x}",
        analysis.blocks.len(),
        count(BlockState::Busy),
        count(BlockState::Free),
        analysis.bounds.start,
        analysis.bounds.end
    );
    if let WalkEnd::Truncated(reason) = &analysis.end {
        line.push_str(&format!("; walk stopped early: {}", reason));
    }
    line
}
