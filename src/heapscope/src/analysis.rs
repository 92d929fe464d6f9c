//! Resolve, walk and scan in one call.

use crate::block::{HeapBlocks, HeapBounds};
use crate::bounds::resolve;
use crate::chunk::ChunkLayout;
use crate::error::{HeapError, Result};
use crate::pointers;
use crate::source::{MemorySource, ModuleLister, SymbolResolver};
use crate::walker::{walk_with_progress, WalkEnd, WalkOptions, DEFAULT_MIN_STRING_LENGTH};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub min_string_length: usize,
    /// Run the pointer scanner after the walk
    pub scan_pointers: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            min_string_length: DEFAULT_MIN_STRING_LENGTH,
            scan_pointers: true,
        }
    }
}

/// Everything one invocation learned about the heap
#[derive(Debug, Clone, Serialize)]
pub struct HeapAnalysis {
    pub bounds: HeapBounds,
    pub layout: ChunkLayout,
    pub blocks: HeapBlocks,
    /// Whether the walk reached the top chunk
    pub complete: bool,
    #[serde(skip)]
    pub end: WalkEnd,
}

/// Locate the heap and decode it
pub fn analyze(
    source: &dyn MemorySource,
    modules: &dyn ModuleLister,
    symbols: &dyn SymbolResolver,
    options: &AnalysisOptions,
    progress: &mut dyn FnMut(f64),
) -> Result<HeapAnalysis> {
    let resolved = resolve(source, modules, symbols)?;
    analyze_bounds(source, resolved.bounds, options, progress)
}

/// Decode the heap in explicitly given bounds
pub fn analyze_bounds(
    source: &dyn MemorySource,
    bounds: HeapBounds,
    options: &AnalysisOptions,
    progress: &mut dyn FnMut(f64),
) -> Result<HeapAnalysis> {
    if bounds.is_empty() {
        return Err(HeapError::BoundsUnresolved(format!(
            "empty heap range {:#x}..{:#x}",
            bounds.start, bounds.end
        )));
    }
    let layout = source.layout()?;
    let walk_options =
        WalkOptions::new(layout).with_min_string_length(options.min_string_length);

    let walk = walk_with_progress(source, bounds, &walk_options, progress);
    let mut blocks = walk.blocks;
    tracing::info!(
        "Collected {} blocks between {:#x} and {:#x}",
        blocks.len(),
        bounds.start,
        bounds.end
    );

    if options.scan_pointers {
        pointers::scan(&mut blocks, source, layout);
    }

    Ok(HeapAnalysis {
        bounds,
        layout,
        complete: walk.end == WalkEnd::Top,
        blocks,
        end: walk.end,
    })
}
