//! # heapscope
//!
//! glibc heap decoder for live processes and core dumps.
//!
//! This library provides functionality to:
//! - Locate the brk heap of a target via `__curbrk`, a layout heuristic, or the
//!   `[heap]` mapping
//! - Walk the `malloc_chunk` chain and classify each chunk's payload
//! - Find chunks holding pointers into other chunks
//! - Export the reachable pointer graph as nodes + edges or Graphviz DOT
//!
//! All target access goes through the [`MemorySource`], [`ModuleLister`] and
//! [`SymbolResolver`] traits, so the same code runs against a live process,
//! a dump file, or an in-memory buffer.
//!
//! ## Example
//!
//! ```no_run
//! use heapscope::{analyze, AnalysisOptions, MemorySource, ModuleLister, SymbolResolver};
//!
//! fn print_heap(
//!     source: &dyn MemorySource,
//!     modules: &dyn ModuleLister,
//!     symbols: &dyn SymbolResolver,
//! ) -> Result<(), heapscope::HeapError> {
//!     let analysis = analyze(source, modules, symbols, &AnalysisOptions::default(), &mut |_| {})?;
//!
//!     for block in &analysis.blocks {
//!         println!("{:#x} {:#x} {} {}", block.address, block.size, block.state, block.annotation);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod block;
pub mod bounds;
pub mod chunk;
pub mod classify;
pub mod error;
pub mod graph;
pub mod pointers;
pub mod source;
pub mod walker;

// Re-export commonly used items
#[doc(inline)]
pub use analysis::{analyze, analyze_bounds, AnalysisOptions, HeapAnalysis};
#[doc(inline)]
pub use block::{
    Annotation, BlockRecord, BlockState, HeapBlocks, HeapBounds, PointerHit, Signature,
};
#[doc(inline)]
pub use bounds::{resolve, BoundOrigin, ResolvedBounds};
#[doc(inline)]
pub use chunk::{ChunkHeader, ChunkLayout};
#[doc(inline)]
pub use classify::classify;
#[doc(inline)]
pub use error::{HeapError, Result};
#[doc(inline)]
pub use graph::{build_graph, HeapGraph, DEFAULT_MAX_NODES};
#[doc(inline)]
pub use source::{MemoryRegion, MemorySource, Module, ModuleLister, SymbolResolver};
#[doc(inline)]
pub use walker::{walk, walk_with_progress, Walk, WalkEnd, WalkOptions, DEFAULT_MIN_STRING_LENGTH};
