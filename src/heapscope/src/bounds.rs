//! Heap bounds discovery.
//!
//! glibc keeps the current program break in `__curbrk`. The copy in libc
//! tracks the heap end and the copy in the dynamic linker the heap start.
//! When the symbols are missing the start location is searched for near the
//! end location, and anything still unknown comes from the `[heap]` mapping.

use crate::block::HeapBounds;
use crate::chunk::ChunkLayout;
use crate::error::{HeapError, Result};
use crate::source::{MemorySource, Module, ModuleLister, SymbolResolver, HEAP_REGION_NAME};
use serde::Serialize;

/// Symbol holding the current program break
pub const CURBRK_SYMBOL: &str = "__curbrk";

/// How far below the end location the start location may sit
const HEURISTIC_WINDOW: u64 = 0x1000;

/// Which strategy produced a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundOrigin {
    Symbol,
    Heuristic,
    Region,
}

impl std::fmt::Display for BoundOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BoundOrigin::Symbol => "__curbrk symbol",
            BoundOrigin::Heuristic => "layout heuristic",
            BoundOrigin::Region => "[heap] region",
        };
        f.write_str(name)
    }
}

/// Heap bounds along with how each side was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedBounds {
    pub bounds: HeapBounds,
    pub start_origin: BoundOrigin,
    pub end_origin: BoundOrigin,
}

/// File names of the C library and dynamic linker among `modules`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorModules {
    pub libc: Option<String>,
    pub ld: Option<String>,
}

impl AllocatorModules {
    pub fn find(modules: &[Module]) -> Self {
        let mut found = AllocatorModules::default();

        for module in modules {
            if found.libc.is_some() && found.ld.is_some() {
                break;
            }

            let name = module.name.as_str();
            if found.libc.is_none() && (name.starts_with("libc-") || name.starts_with("libc.so"))
            {
                tracing::debug!("libc library appears to be: {}", name);
                found.libc = Some(name.to_string());
            } else if found.ld.is_none() && name.starts_with("ld-") {
                tracing::debug!("ld library appears to be: {}", name);
                found.ld = Some(name.to_string());
            }
        }

        found
    }
}

/// Resolve the heap bounds of the target
pub fn resolve(
    source: &dyn MemorySource,
    modules: &dyn ModuleLister,
    symbols: &dyn SymbolResolver,
) -> Result<ResolvedBounds> {
    let layout = source.layout()?;
    let libs = AllocatorModules::find(&modules.loaded_modules());

    let end_location = lookup_curbrk(symbols, libs.libc.as_deref());
    if end_location.is_none() {
        tracing::debug!("{} not found in libc", CURBRK_SYMBOL);
    }

    let mut start_origin = BoundOrigin::Symbol;
    let mut start_location = lookup_curbrk(symbols, libs.ld.as_deref());
    if start_location.is_none() {
        if let Some(end_location) = end_location {
            tracing::warn!(
                "{} not found in ld, falling back on heuristic. This may or may not work.",
                CURBRK_SYMBOL
            );
            start_location = find_heap_start_heuristic(source, end_location, layout);
            start_origin = BoundOrigin::Heuristic;
        }
    }

    if let Some(location) = start_location {
        tracing::debug!("heap start symbol: {:#x}", location);
    }
    if let Some(location) = end_location {
        tracing::debug!("heap end symbol: {:#x}", location);
    }

    let mut start = start_location.and_then(|loc| read_bound(source, loc, layout));
    let mut end = end_location.and_then(|loc| read_bound(source, loc, layout));
    let mut end_origin = BoundOrigin::Symbol;

    if start.is_none() || end.is_none() {
        if let Some(region) = source.find_region_by_name(HEAP_REGION_NAME) {
            tracing::info!(
                "Found a memory region named '{}', assuming that it provides sane bounds",
                HEAP_REGION_NAME
            );
            if start.is_none() {
                start = Some(region.start);
                start_origin = BoundOrigin::Region;
            }
            if end.is_none() {
                end = Some(region.end);
                end_origin = BoundOrigin::Region;
            }
        }
    }

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            tracing::info!("heap start: {:#x}, heap end: {:#x}", start, end);
            Ok(ResolvedBounds {
                bounds: HeapBounds::new(start, end),
                start_origin,
                end_origin,
            })
        }
        (Some(start), Some(end)) => Err(HeapError::BoundsUnresolved(format!(
            "heap end {:#x} is not above heap start {:#x}",
            end, start
        ))),
        _ => Err(HeapError::BoundsUnresolved(
            "Failed to calculate the bounds of the heap.".to_string(),
        )),
    }
}

fn lookup_curbrk(symbols: &dyn SymbolResolver, module: Option<&str>) -> Option<u64> {
    let module = module?;
    symbols.find(&format!("{}::{}", module, CURBRK_SYMBOL))
}

/// Value stored at a bound location; zero means unknown
fn read_bound(source: &dyn MemorySource, location: u64, layout: ChunkLayout) -> Option<u64> {
    source
        .read_word(location, layout)
        .ok()
        .filter(|&value| value != 0)
}

/// Search below `end_location` for the heap start location
///
/// The candidate is accepted when the word four slots below it holds the
/// page size, which is how the allocator's bookkeeping sits next to it.
pub fn find_heap_start_heuristic(
    source: &dyn MemorySource,
    end_location: u64,
    layout: ChunkLayout,
) -> Option<u64> {
    let word = layout.word_size() as u64;
    let page_size = source.page_size();

    (0..HEURISTIC_WINDOW)
        .step_by(word as usize)
        .filter_map(|offset| end_location.checked_sub(offset))
        .find(|&candidate| {
            candidate
                .checked_sub(word * 4)
                .and_then(|address| source.read_word(address, layout).ok())
                == Some(page_size)
        })
}
