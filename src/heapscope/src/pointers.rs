//! Intra-heap pointer detection.
//!
//! Every word-aligned address inside a block's payload is a possible pointer
//! target. Blocks the classifier left empty are read word by word and each
//! value that lands on such an address links the two blocks.

use crate::block::{Annotation, BlockRecord, HeapBlocks, PointerHit};
use crate::chunk::ChunkLayout;
use crate::source::MemorySource;
use rayon::prelude::*;

/// Bytes read from the target per request while scanning a payload
const SCAN_WINDOW: usize = 0x10000;

#[derive(Debug, Clone, Copy)]
struct TargetRange {
    start: u64,
    end: u64,
    block: u64,
}

/// Maps word-aligned payload addresses to the block that owns them
///
/// Stored as sorted payload ranges rather than one entry per word: blocks
/// never overlap, so a range lookup answers the same question.
#[derive(Debug, Clone)]
pub struct TargetIndex {
    ranges: Vec<TargetRange>,
    word: u64,
}

impl TargetIndex {
    pub fn build(blocks: &[BlockRecord], layout: ChunkLayout) -> Self {
        let ranges = blocks
            .iter()
            .filter_map(|b| {
                let start = layout.payload_start(b.address);
                let end = b.end();
                (start < end).then_some(TargetRange {
                    start,
                    end,
                    block: b.address,
                })
            })
            .collect();

        TargetIndex {
            ranges,
            word: layout.word_size() as u64,
        }
    }

    /// Start of the block whose payload holds `value` at a word boundary
    pub fn lookup(&self, value: u64) -> Option<u64> {
        let idx = self.ranges.partition_point(|r| r.start <= value);
        let range = self.ranges.get(idx.checked_sub(1)?)?;

        if value < range.end && (value - range.start) % self.word == 0 {
            Some(range.block)
        } else {
            None
        }
    }

    /// Number of word-aligned addresses covered
    pub fn address_count(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| (r.end - r.start).div_ceil(self.word))
            .sum()
    }
}

/// Link blocks that hold pointers into other blocks
///
/// Only blocks with an empty annotation are scanned; every occurrence of a
/// target is recorded, so a value stored twice yields two entries.
pub fn scan(blocks: &mut HeapBlocks, source: &dyn MemorySource, layout: ChunkLayout) {
    let index = TargetIndex::build(blocks.as_slice(), layout);
    tracing::debug!(
        "Pointer target index covers {} addresses in {} blocks",
        index.address_count(),
        blocks.len()
    );

    blocks
        .as_mut_slice()
        .par_iter_mut()
        .filter(|block| block.annotation.is_empty())
        .for_each(|block| {
            let hits = scan_block(source, &index, block, layout);
            if !hits.is_empty() {
                block.points_to = hits.iter().map(|hit| hit.block).collect();
                block.annotation = Annotation::Pointers(hits);
            }
        });

    let linked = blocks.iter().filter(|b| !b.points_to.is_empty()).count();
    tracing::info!("Found pointers in {} of {} blocks", linked, blocks.len());
}

/// Every word in the block's payload that points into an indexed block
fn scan_block(
    source: &dyn MemorySource,
    index: &TargetIndex,
    block: &BlockRecord,
    layout: ChunkLayout,
) -> Vec<PointerHit> {
    let start = layout.payload_start(block.address);
    let end = block.end();
    let mut hits = Vec::new();

    let mut window_start = start;
    while window_start < end {
        let len = (end - window_start).min(SCAN_WINDOW as u64) as usize;
        for_each_word(source, window_start, len, layout, |value| {
            if let Some(target) = index.lookup(value) {
                hits.push(PointerHit {
                    value,
                    block: target,
                });
            }
        });
        window_start += len as u64;
    }

    hits
}

/// Visit each complete word in `[address, address + len)`, skipping words
/// that cannot be read
fn for_each_word(
    source: &dyn MemorySource,
    address: u64,
    len: usize,
    layout: ChunkLayout,
    mut visit: impl FnMut(u64),
) {
    let word = layout.word_size();

    match source.read_bytes(address, len) {
        Ok(bytes) => {
            for chunk in bytes.chunks_exact(word) {
                visit(layout.read_word(chunk));
            }
        }
        Err(_) => {
            for offset in (0..len / word).map(|i| (i * word) as u64) {
                if let Ok(value) = source.read_word(address + offset, layout) {
                    visit(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockState, Signature};
    use crate::source::{MemoryRegion, MockMemorySource};

    const W: ChunkLayout = ChunkLayout::Wide;

    fn block(address: u64, size: u64) -> BlockRecord {
        BlockRecord::new(address, size, BlockState::Busy, Annotation::Empty)
    }

    fn three_blocks() -> HeapBlocks {
        vec![block(0x1000, 0x30), block(0x1030, 0x30), block(0x1060, 0x40)].into()
    }

    #[test]
    fn test_index_lookup() {
        let index = TargetIndex::build(three_blocks().as_slice(), W);

        // Payload of 0x1000 spans 0x1010..0x1030
        assert_eq!(index.lookup(0x1010), Some(0x1000));
        assert_eq!(index.lookup(0x1028), Some(0x1000));
        assert_eq!(index.lookup(0x1040), Some(0x1030));
        assert_eq!(index.lookup(0x1098), Some(0x1060));

        // Headers, misaligned values and out-of-heap values miss
        assert_eq!(index.lookup(0x1000), None);
        assert_eq!(index.lookup(0x1030), None);
        assert_eq!(index.lookup(0x1014), None);
        assert_eq!(index.lookup(0x10a0), None);
        assert_eq!(index.lookup(0), None);

        assert_eq!(index.address_count(), 4 + 4 + 6);
    }

    #[test]
    fn test_index_narrow_alignment() {
        let blocks: HeapBlocks = vec![block(0x1000, 0x18)].into();
        let index = TargetIndex::build(blocks.as_slice(), ChunkLayout::Narrow);

        assert_eq!(index.lookup(0x1008), Some(0x1000));
        assert_eq!(index.lookup(0x100c), Some(0x1000));
        assert_eq!(index.lookup(0x100a), None);
    }

    #[test]
    fn test_scan_links_single_pointer() {
        let mut source = MockMemorySource::zeroed(0x1000, 0xa0);
        // A's payload holds B's user pointer once
        source.write_word(0x1018, 0x1040, W);

        let mut blocks = three_blocks();
        scan(&mut blocks, &source, W);

        let a = blocks.find(0x1000).unwrap();
        assert_eq!(a.points_to, vec![0x1030]);
        assert_eq!(
            a.annotation,
            Annotation::Pointers(vec![PointerHit {
                value: 0x1040,
                block: 0x1030
            }])
        );
        assert_eq!(a.annotation.to_string(), "pointer to block at 0x1030");

        assert!(blocks.find(0x1030).unwrap().points_to.is_empty());
        assert!(blocks.find(0x1060).unwrap().annotation.is_empty());
    }

    #[test]
    fn test_scan_records_each_occurrence() {
        let mut source = MockMemorySource::zeroed(0x1000, 0xa0);
        source.write_word(0x1070, 0x1010, W);
        source.write_word(0x1078, 0x1040, W);
        source.write_word(0x1080, 0x1010, W);

        let mut blocks = three_blocks();
        scan(&mut blocks, &source, W);

        let c = blocks.find(0x1060).unwrap();
        assert_eq!(c.points_to, vec![0x1000, 0x1030, 0x1000]);
        assert_eq!(
            c.annotation.to_string(),
            "pointer to block at 0x1000 | pointer to block at 0x1030 | pointer to block at 0x1000"
        );
    }

    #[test]
    fn test_interior_pointer_links_owner() {
        let mut source = MockMemorySource::zeroed(0x1000, 0xa0);
        source.write_word(0x1010, 0x1088, W);

        let mut blocks = three_blocks();
        scan(&mut blocks, &source, W);

        assert_eq!(blocks.find(0x1000).unwrap().points_to, vec![0x1060]);
    }

    #[test]
    fn test_classified_blocks_are_targets_not_sources() {
        let mut source = MockMemorySource::zeroed(0x1000, 0xa0);
        source.write_word(0x1040, 0x1070, W);
        source.write_word(0x1070, 0x1040, W);

        let mut blocks: HeapBlocks = vec![
            block(0x1000, 0x30),
            BlockRecord::new(
                0x1030,
                0x30,
                BlockState::Busy,
                Annotation::Signature(Signature::Gzip),
            ),
            block(0x1060, 0x40),
        ]
        .into();
        scan(&mut blocks, &source, W);

        let b = blocks.find(0x1030).unwrap();
        assert!(b.points_to.is_empty());
        assert_eq!(b.annotation, Annotation::Signature(Signature::Gzip));

        assert_eq!(blocks.find(0x1060).unwrap().points_to, vec![0x1030]);
    }

    #[test]
    fn test_unreadable_words_are_skipped() {
        let mut source = MockMemorySource::with_regions(
            vec![0; 0x90],
            0x1000,
            vec![MemoryRegion::anonymous(0x1000, 0x1090)],
        );
        source.write_word(0x1070, 0x1010, W);

        // 0x1060's payload runs past the readable data; the bulk read fails
        // and the readable words are still scanned one by one
        let mut blocks = three_blocks();
        scan(&mut blocks, &source, W);

        assert_eq!(blocks.find(0x1060).unwrap().points_to, vec![0x1000]);
    }

    #[test]
    fn test_scan_narrow_layout() {
        let mut source = MockMemorySource::zeroed(0x2000, 0x40).with_pointer_width(4);
        source.write_word(0x2008, 0x2028, ChunkLayout::Narrow);

        let mut blocks: HeapBlocks = vec![block(0x2000, 0x20), block(0x2020, 0x20)].into();
        scan(&mut blocks, &source, ChunkLayout::Narrow);

        assert_eq!(blocks.find(0x2000).unwrap().points_to, vec![0x2020]);
    }
}
