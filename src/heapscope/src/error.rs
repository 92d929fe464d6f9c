//! Error types shared across the heap decoder.

use thiserror::Error;

/// Errors that can occur while locating or decoding a heap
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("Failed to read {len} bytes at {address:#x}")]
    ReadFailure { address: u64, len: usize },

    #[error("Chunk header too short: expected {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    #[error("Could not calculate heap bounds: {0}")]
    BoundsUnresolved(String),

    #[error("Chunk at {address:#x} points outside the heap (next chunk at {next:#x})")]
    CorruptChain { address: u64, next: u64 },

    #[error("Chunk at {address:#x} does not advance the walk")]
    SelfReference { address: u64 },

    #[error("Unsupported pointer width: {0} bytes")]
    UnsupportedPointerWidth(usize),

    #[error("Graph would contain {nodes} nodes (limit {limit})")]
    GraphTooLarge { nodes: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, HeapError>;
