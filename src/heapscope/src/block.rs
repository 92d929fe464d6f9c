//! Heap block model produced by a walk.

use serde::Serialize;
use std::fmt;

/// Allocation state of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockState {
    Busy,
    Free,
    /// Trailing unallocated chunk of the heap
    Top,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockState::Busy => "Busy",
            BlockState::Free => "Free",
            BlockState::Top => "Top",
        };
        f.pad(name)
    }
}

/// Well-known file formats recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signature {
    Png,
    Xpm,
    Bzip,
    Compress,
    Gzip,
}

impl Signature {
    /// Magic bytes at offset 0, in match order
    pub const TABLE: [(Signature, &'static [u8]); 5] = [
        (Signature::Png, b"\x89PNG"),
        (Signature::Xpm, b"/* XPM */"),
        (Signature::Bzip, b"BZ"),
        (Signature::Compress, b"\x1f\x9d"),
        (Signature::Gzip, b"\x1f\x8b"),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Signature::Png => "PNG IMAGE",
            Signature::Xpm => "XPM IMAGE",
            Signature::Bzip => "BZIP FILE",
            Signature::Compress => "COMPRESS FILE",
            Signature::Gzip => "GZIP FILE",
        }
    }
}

/// A word in a payload whose value lands inside another block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerHit {
    /// Raw value read from the payload
    pub value: u64,
    /// Start address of the block the value points into
    pub block: u64,
}

/// What a block's payload appears to contain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Annotation {
    #[default]
    Empty,
    Ascii(String),
    Utf16(String),
    Signature(Signature),
    Pointers(Vec<PointerHit>),
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        matches!(self, Annotation::Empty)
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Empty => Ok(()),
            Annotation::Ascii(text) => write!(f, "ASCII \"{}\"", text),
            Annotation::Utf16(text) => write!(f, "UTF-16 \"{}\"", text),
            Annotation::Signature(sig) => f.write_str(sig.label()),
            Annotation::Pointers(hits) => {
                for (i, hit) in hits.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "pointer to block at {:#x}", hit.block)?;
                }
                Ok(())
            }
        }
    }
}

/// One chunk of the heap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRecord {
    /// Chunk start (header address)
    pub address: u64,
    /// Chunk size with flag bits stripped
    pub size: u64,
    pub state: BlockState,
    pub annotation: Annotation,
    /// Blocks referenced from this block's payload, in payload order
    pub points_to: Vec<u64>,
}

impl BlockRecord {
    pub fn new(address: u64, size: u64, state: BlockState, annotation: Annotation) -> Self {
        BlockRecord {
            address,
            size,
            state,
            annotation,
            points_to: Vec::new(),
        }
    }

    /// Address one past the end of the chunk
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// `(address, size)` pair for dumping the raw bytes elsewhere
    pub fn span(&self) -> (u64, u64) {
        (self.address, self.size)
    }
}

/// Address range holding the chunk chain (end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapBounds {
    pub start: u64,
    pub end: u64,
}

impl HeapBounds {
    pub fn new(start: u64, end: u64) -> Self {
        HeapBounds { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }
}

/// Ordered, append-only list of blocks from a single walk
///
/// Blocks are identified by address; look them up again with [`find`]
/// instead of holding references across calls.
///
/// [`find`]: HeapBlocks::find
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeapBlocks {
    blocks: Vec<BlockRecord>,
}

impl HeapBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block. Addresses must arrive in increasing order.
    pub fn push(&mut self, block: BlockRecord) {
        debug_assert!(self
            .blocks
            .last()
            .map(|last| last.address < block.address)
            .unwrap_or(true));
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockRecord> {
        self.blocks.iter()
    }

    pub fn as_slice(&self) -> &[BlockRecord] {
        &self.blocks
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [BlockRecord] {
        &mut self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&BlockRecord> {
        self.blocks.get(index)
    }

    /// Index of the block starting exactly at `address`
    pub fn position(&self, address: u64) -> Option<usize> {
        self.blocks
            .binary_search_by_key(&address, |b| b.address)
            .ok()
    }

    /// Block starting exactly at `address`
    pub fn find(&self, address: u64) -> Option<&BlockRecord> {
        self.position(address).map(|i| &self.blocks[i])
    }

    /// Block whose `[address, address + size)` span contains `address`
    pub fn containing(&self, address: u64) -> Option<&BlockRecord> {
        let idx = self.blocks.partition_point(|b| b.address <= address);
        let block = self.blocks.get(idx.checked_sub(1)?)?;
        (address < block.end()).then_some(block)
    }
}

impl<'a> IntoIterator for &'a HeapBlocks {
    type Item = &'a BlockRecord;
    type IntoIter = std::slice::Iter<'a, BlockRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl From<Vec<BlockRecord>> for HeapBlocks {
    fn from(mut blocks: Vec<BlockRecord>) -> Self {
        blocks.sort_by_key(|b| b.address);
        HeapBlocks { blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeapBlocks {
        let mut blocks = HeapBlocks::new();
        blocks.push(BlockRecord::new(0x1000, 0x20, BlockState::Busy, Annotation::Empty));
        blocks.push(BlockRecord::new(0x1020, 0x30, BlockState::Free, Annotation::Empty));
        blocks.push(BlockRecord::new(0x1050, 0x100, BlockState::Top, Annotation::Empty));
        blocks
    }

    #[test]
    fn test_find_by_address() {
        let blocks = sample();
        assert_eq!(blocks.find(0x1020).unwrap().size, 0x30);
        assert_eq!(blocks.position(0x1050), Some(2));
        assert!(blocks.find(0x1021).is_none());
    }

    #[test]
    fn test_containing() {
        let blocks = sample();
        assert_eq!(blocks.containing(0x1000).unwrap().address, 0x1000);
        assert_eq!(blocks.containing(0x101f).unwrap().address, 0x1000);
        assert_eq!(blocks.containing(0x1020).unwrap().address, 0x1020);
        assert_eq!(blocks.containing(0x114f).unwrap().address, 0x1050);
        assert!(blocks.containing(0x1150).is_none());
        assert!(blocks.containing(0xfff).is_none());
    }

    #[test]
    fn test_annotation_display() {
        assert_eq!(Annotation::Empty.to_string(), "");
        assert_eq!(
            Annotation::Ascii("hello".into()).to_string(),
            "ASCII \"hello\""
        );
        assert_eq!(
            Annotation::Utf16("wide".into()).to_string(),
            "UTF-16 \"wide\""
        );
        assert_eq!(
            Annotation::Signature(Signature::Gzip).to_string(),
            "GZIP FILE"
        );

        let hits = Annotation::Pointers(vec![
            PointerHit {
                value: 0x1030,
                block: 0x1020,
            },
            PointerHit {
                value: 0x1060,
                block: 0x1050,
            },
        ]);
        assert_eq!(
            hits.to_string(),
            "pointer to block at 0x1020 | pointer to block at 0x1050"
        );
    }

    #[test]
    fn test_block_span() {
        let block = BlockRecord::new(0x1000, 0x20, BlockState::Busy, Annotation::Empty);
        assert_eq!(block.span(), (0x1000, 0x20));
        assert_eq!(block.end(), 0x1020);
    }

    #[test]
    fn test_heap_bounds() {
        let bounds = HeapBounds::new(0x5000, 0x9000);
        assert_eq!(bounds.len(), 0x4000);
        assert!(!bounds.is_empty());
        assert!(bounds.contains(0x5000));
        assert!(!bounds.contains(0x9000));
        assert!(HeapBounds::new(0x9000, 0x5000).is_empty());
    }

    #[test]
    fn test_block_serializes_to_json() {
        let mut block = BlockRecord::new(
            0x1000,
            0x20,
            BlockState::Busy,
            Annotation::Ascii("hi there".into()),
        );
        block.points_to.push(0x1050);

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["address"], 0x1000);
        assert_eq!(json["state"], "Busy");
        assert_eq!(json["annotation"]["kind"], "ascii");
        assert_eq!(json["annotation"]["value"], "hi there");
        assert_eq!(json["points_to"][0], 0x1050);
    }
}
