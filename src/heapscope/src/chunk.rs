//! glibc `malloc_chunk` header decoding.
//!
//! A chunk starts with two machine words:
//!
//! | offset | field       |
//! |--------|-------------|
//! | 0      | `prev_size` |
//! | w      | `size`      |
//!
//! where `w` is the target's word width. The low three bits of `size` carry
//! flags; the user payload starts right after the header.

use crate::error::{HeapError, Result};
use byteorder::{ByteOrder, LE};
use serde::Serialize;

/// Previous chunk is in use
pub const PREV_INUSE: u64 = 0x1;
/// Chunk was obtained with mmap()
pub const IS_MMAPPED: u64 = 0x2;
/// Chunk belongs to a thread arena
pub const NON_MAIN_ARENA: u64 = 0x4;
/// All flag bits stored in the size field
pub const SIZE_BITS: u64 = PREV_INUSE | IS_MMAPPED | NON_MAIN_ARENA;

/// Word width of the target process, chosen once per walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLayout {
    /// 32-bit target (4-byte words)
    Narrow,
    /// 64-bit target (8-byte words)
    Wide,
}

impl ChunkLayout {
    /// Select a layout from a pointer width in bytes
    pub fn from_pointer_width(width: usize) -> Result<Self> {
        match width {
            4 => Ok(ChunkLayout::Narrow),
            8 => Ok(ChunkLayout::Wide),
            other => Err(HeapError::UnsupportedPointerWidth(other)),
        }
    }

    pub fn word_size(self) -> usize {
        match self {
            ChunkLayout::Narrow => 4,
            ChunkLayout::Wide => 8,
        }
    }

    /// Bytes occupied by `prev_size` + `size`
    pub fn header_size(self) -> usize {
        self.word_size() * 2
    }

    /// Decode one little-endian word from the front of `bytes`
    pub fn read_word(self, bytes: &[u8]) -> u64 {
        match self {
            ChunkLayout::Narrow => LE::read_u32(bytes) as u64,
            ChunkLayout::Wide => LE::read_u64(bytes),
        }
    }

    /// Address of the first payload byte of the chunk at `chunk`
    pub fn payload_start(self, chunk: u64) -> u64 {
        chunk.wrapping_add(self.header_size() as u64)
    }
}

/// Decoded chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Size of the previous chunk (only meaningful if it is free)
    pub prev_size: u64,
    /// Raw size field including flag bits
    pub size: u64,
}

impl ChunkHeader {
    /// Parse a chunk header from raw bytes
    pub fn decode(bytes: &[u8], layout: ChunkLayout) -> Result<Self> {
        let expected = layout.header_size();
        if bytes.len() < expected {
            return Err(HeapError::MalformedHeader {
                expected,
                actual: bytes.len(),
            });
        }

        let word = layout.word_size();
        Ok(ChunkHeader {
            prev_size: layout.read_word(&bytes[..word]),
            size: layout.read_word(&bytes[word..expected]),
        })
    }

    /// Size of this chunk with the flag bits stripped
    pub fn chunk_size(&self) -> u64 {
        self.size & !SIZE_BITS
    }

    pub fn prev_in_use(&self) -> bool {
        self.size & PREV_INUSE != 0
    }

    pub fn is_mmapped(&self) -> bool {
        self.size & IS_MMAPPED != 0
    }

    pub fn non_main_arena(&self) -> bool {
        self.size & NON_MAIN_ARENA != 0
    }
}
