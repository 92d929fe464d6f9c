//! Block command handler
//!
//! Shows a single block: header fields, annotation, outgoing pointers and a
//! hex dump of its span.

use super::target::Target;
use crate::cli::{BoundsArgs, TargetArgs};
use crate::config::Config;

use anyhow::{Context, Result};
use heapscope::{AnalysisOptions, ChunkHeader, MemorySource};
use std::fmt::Write;

pub fn handle(target: &TargetArgs, bounds: &BoundsArgs, address: u64, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let options = AnalysisOptions {
        min_string_length: config.min_string_length,
        scan_pointers: true,
    };

    let target = Target::open(target)?;
    let analysis = target.analyze(bounds, &options)?;
    let block = analysis
        .blocks
        .containing(address)
        .with_context(|| format!("No heap block contains {:#x}", address))?;

    let source = target.source.as_ref();
    let layout = analysis.layout;
    let header_bytes = source.read_bytes(block.address, layout.header_size())?;
    let header = ChunkHeader::decode(&header_bytes, layout)?;

    println!("Block:    {:#x}..{:#x}", block.address, block.end());
    println!("Size:     {:#x}", block.size);
    println!("State:    {}", block.state);
    println!(
        "Flags:    prev_inuse={} mmapped={} non_main_arena={}",
        header.prev_in_use(),
        header.is_mmapped(),
        header.non_main_arena()
    );
    if !block.annotation.is_empty() {
        println!("Data:     {}", block.annotation);
    }
    for link in &block.points_to {
        println!("Links to: {:#x}", link);
    }

    let len = block.size.min(limit as u64) as usize;
    if len == 0 {
        return Ok(());
    }

    let data = read_span(source, block.address, len)?;
    println!();
    println!("Dump ({} of {} bytes):", data.len(), block.size);
    print!("{}", hex_dump(block.address, &data));
    Ok(())
}

fn read_span(source: &dyn MemorySource, address: u64, len: usize) -> Result<Vec<u8>> {
    source
        .read_bytes(address, len)
        .with_context(|| format!("Failed to read block at {:#x}", address))
}

/// 16 bytes per line: offset, hex split after 8, ASCII column
fn hex_dump(address: u64, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", address + (i * 16) as u64);
        for j in 0..16 {
            match chunk.get(j) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if j == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for &byte in chunk {
            let c = byte as char;
            if c.is_ascii_graphic() || c == ' ' {
                out.push(c);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }
    out
}
