//! Bounds command handler

use super::target::Target;
use crate::cli::TargetArgs;

use anyhow::Result;
use heapscope::{resolve, ResolvedBounds};

pub fn handle(target: &TargetArgs) -> Result<()> {
    let target = Target::open(target)?;
    let resolved = resolve(target.source.as_ref(), &target.symbols, &target.symbols)?;

    println!("Target: {}", target.description);
    print!("{}", describe(&resolved));
    Ok(())
}

fn describe(resolved: &ResolvedBounds) -> String {
    let bounds = resolved.bounds;
    format!(
        "Heap start: {:#x} (from {})\nHeap end:   {:#x} (from {})\nSize:       {:#x} ({} KB)\n",
        bounds.start,
        resolved.start_origin,
        bounds.end,
        resolved.end_origin,
        bounds.len(),
        bounds.len() / 1024
    )
}
