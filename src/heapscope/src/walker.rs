//! Chunk chain traversal.
//!
//! Walks `[start, end)` one chunk at a time. Each step's address depends on
//! the previous chunk's decoded size, so the walk is strictly sequential.
//! Any inconsistency ends the walk early; the blocks collected up to that
//! point are still returned.

use crate::block::{Annotation, BlockRecord, BlockState, HeapBlocks, HeapBounds};
use crate::chunk::{ChunkHeader, ChunkLayout};
use crate::classify::classify;
use crate::error::HeapError;
use crate::source::MemorySource;

/// Minimum printable run reported as a string
pub const DEFAULT_MIN_STRING_LENGTH: usize = 4;

/// Per-walk parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub layout: ChunkLayout,
    pub min_string_length: usize,
}

impl WalkOptions {
    pub fn new(layout: ChunkLayout) -> Self {
        WalkOptions {
            layout,
            min_string_length: DEFAULT_MIN_STRING_LENGTH,
        }
    }

    pub fn with_min_string_length(mut self, min_string_length: usize) -> Self {
        self.min_string_length = min_string_length;
        self
    }
}

/// Why a walk stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// The chain ended exactly at the heap end
    Top,
    /// The chain broke; the block list covers the heap up to this point
    Truncated(HeapError),
}

/// Result of a walk
#[derive(Debug, Clone)]
pub struct Walk {
    pub blocks: HeapBlocks,
    pub end: WalkEnd,
}

impl Walk {
    pub fn is_complete(&self) -> bool {
        self.end == WalkEnd::Top
    }
}

/// Walk the chunk chain without progress reporting
pub fn walk(source: &dyn MemorySource, bounds: HeapBounds, options: &WalkOptions) -> Walk {
    walk_with_progress(source, bounds, options, &mut |_| {})
}

/// Walk the chunk chain, reporting the consumed fraction of the heap after
/// every step
pub fn walk_with_progress(
    source: &dyn MemorySource,
    bounds: HeapBounds,
    options: &WalkOptions,
    progress: &mut dyn FnMut(f64),
) -> Walk {
    let mut blocks = HeapBlocks::new();

    if bounds.is_empty() {
        let end = WalkEnd::Truncated(HeapError::BoundsUnresolved(format!(
            "empty heap range {:#x}..{:#x}",
            bounds.start, bounds.end
        )));
        return Walk { blocks, end };
    }

    let layout = options.layout;
    let total = bounds.len() as f64;
    let mut cursor = bounds.start;

    let end = loop {
        let header = match read_header(source, cursor, layout) {
            Ok(header) => header,
            Err(err) => break WalkEnd::Truncated(err),
        };

        let size = header.chunk_size();
        let next = cursor.checked_add(size);

        if next == Some(bounds.end) {
            blocks.push(BlockRecord::new(
                cursor,
                size,
                BlockState::Top,
                Annotation::Empty,
            ));
            progress(1.0);
            break WalkEnd::Top;
        }

        let next = match next {
            Some(next) if bounds.contains(next) => next,
            other => {
                break WalkEnd::Truncated(HeapError::CorruptChain {
                    address: cursor,
                    next: other.unwrap_or(u64::MAX),
                })
            }
        };

        if next == cursor {
            break WalkEnd::Truncated(HeapError::SelfReference { address: cursor });
        }

        // The in-use bit for this chunk lives in the next chunk's header
        let state = match read_header(source, next, layout) {
            Ok(following) if following.prev_in_use() => BlockState::Busy,
            Ok(_) => BlockState::Free,
            Err(err) => break WalkEnd::Truncated(err),
        };

        let payload_len = size.saturating_sub(layout.header_size() as u64);
        let annotation = classify(
            source,
            layout.payload_start(cursor),
            payload_len,
            options.min_string_length,
        );

        blocks.push(BlockRecord::new(cursor, size, state, annotation));

        cursor = next;
        progress((cursor - bounds.start) as f64 / total);
    };

    match &end {
        WalkEnd::Top => tracing::debug!("Walk reached top chunk after {} blocks", blocks.len()),
        WalkEnd::Truncated(reason) => {
            tracing::debug!("Walk stopped after {} blocks: {}", blocks.len(), reason)
        }
    }

    Walk { blocks, end }
}

fn read_header(
    source: &dyn MemorySource,
    address: u64,
    layout: ChunkLayout,
) -> crate::Result<ChunkHeader> {
    let len = layout.header_size();
    let bytes = source
        .read_bytes(address, len)
        .map_err(|_| HeapError::ReadFailure { address, len })?;
    ChunkHeader::decode(&bytes, layout)
}
