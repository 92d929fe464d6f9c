//! Mock Memory Source
//!
//! In-memory target used by the walker, scanner and resolver tests.

use super::{MemoryRegion, MemorySource, Module, ModuleLister, SymbolResolver, DEFAULT_PAGE_SIZE};
use crate::chunk::ChunkLayout;
use anyhow::{bail, Result};
use std::collections::HashMap;

/// A mock memory source backed by a contiguous buffer
pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    pub data: Vec<u8>,
    /// Base virtual address for the data
    pub base_address: u64,
    /// Memory regions (for region-based operations)
    pub regions: Vec<MemoryRegion>,
    pub page_size: u64,
    pub pointer_width: usize,
}

impl MockMemorySource {
    /// Create a new 64-bit mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: u64) -> Self {
        let end = base_address + data.len() as u64;
        Self::with_regions(
            data,
            base_address,
            vec![MemoryRegion::anonymous(base_address, end)],
        )
    }

    /// Create with multiple regions
    pub fn with_regions(data: Vec<u8>, base_address: u64, regions: Vec<MemoryRegion>) -> Self {
        Self {
            data,
            base_address,
            regions,
            page_size: DEFAULT_PAGE_SIZE,
            pointer_width: 8,
        }
    }

    /// Zero-filled mock spanning `[base, base + len)`
    pub fn zeroed(base_address: u64, len: usize) -> Self {
        Self::new(vec![0; len], base_address)
    }

    pub fn with_pointer_width(mut self, width: usize) -> Self {
        self.pointer_width = width;
        self
    }

    /// Copy `bytes` into the buffer at virtual address `address`
    pub fn write(&mut self, address: u64, bytes: &[u8]) {
        let offset = (address - self.base_address) as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Store one little-endian word of the given layout
    pub fn write_word(&mut self, address: u64, value: u64, layout: ChunkLayout) {
        match layout {
            ChunkLayout::Narrow => self.write(address, &(value as u32).to_le_bytes()),
            ChunkLayout::Wide => self.write(address, &value.to_le_bytes()),
        }
    }

    /// Write a chunk header (`prev_size` = 0) at `address`
    pub fn write_chunk(&mut self, address: u64, size: u64, layout: ChunkLayout) {
        self.write_word(address, 0, layout);
        self.write_word(address + layout.word_size() as u64, size, layout);
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if address < self.base_address {
            bail!("Address {:#x} below base {:#x}", address, self.base_address);
        }

        let offset = (address - self.base_address) as usize;
        if offset + size > self.data.len() {
            bail!(
                "Read of {} bytes at {:#x} exceeds data size {}",
                size,
                address,
                self.data.len()
            );
        }

        Ok(self.data[offset..offset + size].to_vec())
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn pointer_width(&self) -> usize {
        self.pointer_width
    }
}

/// Fixed module list and symbol table
#[derive(Default)]
pub struct MockSymbols {
    pub modules: Vec<Module>,
    pub symbols: HashMap<String, u64>,
}

impl MockSymbols {
    pub fn with_module(mut self, path: &str) -> Self {
        self.modules.push(Module::from_path(path));
        self
    }

    pub fn with_symbol(mut self, qualified_name: &str, address: u64) -> Self {
        self.symbols.insert(qualified_name.to_string(), address);
        self
    }
}

impl ModuleLister for MockSymbols {
    fn loaded_modules(&self) -> Vec<Module> {
        self.modules.clone()
    }
}

impl SymbolResolver for MockSymbols {
    fn find(&self, qualified_name: &str) -> Option<u64> {
        self.symbols.get(qualified_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_read_bytes() {
        let data = vec![0x41, 0x42, 0x43, 0x44]; // "ABCD"
        let source = MockMemorySource::new(data, 0x1000);

        let result = source.read_bytes(0x1000, 4).unwrap();
        assert_eq!(result, vec![0x41, 0x42, 0x43, 0x44]);

        let partial = source.read_bytes(0x1001, 2).unwrap();
        assert_eq!(partial, vec![0x42, 0x43]);
    }

    #[test]
    fn test_mock_source_read_out_of_bounds() {
        let source = MockMemorySource::new(vec![0x41, 0x42, 0x43, 0x44], 0x1000);

        // Reading past end should fail
        assert!(source.read_bytes(0x1002, 10).is_err());

        // Reading before base should fail
        assert!(source.read_bytes(0x500, 4).is_err());
    }

    #[test]
    fn test_mock_write_chunk() {
        let mut source = MockMemorySource::zeroed(0x1000, 0x20);
        source.write_chunk(0x1000, 0x21, ChunkLayout::Wide);
        assert_eq!(source.read_word(0x1008, ChunkLayout::Wide).unwrap(), 0x21);

        let mut narrow = MockMemorySource::zeroed(0x1000, 0x10).with_pointer_width(4);
        narrow.write_chunk(0x1000, 0x11, ChunkLayout::Narrow);
        assert_eq!(narrow.read_word(0x1004, ChunkLayout::Narrow).unwrap(), 0x11);
        assert_eq!(narrow.layout().unwrap(), ChunkLayout::Narrow);
    }

    #[test]
    fn test_mock_symbols() {
        let symbols = MockSymbols::default()
            .with_module("/lib/libc.so.6")
            .with_symbol("libc.so.6::__curbrk", 0x7000);

        assert_eq!(symbols.loaded_modules().len(), 1);
        assert_eq!(symbols.find("libc.so.6::__curbrk"), Some(0x7000));
        assert_eq!(symbols.find("ld.so::__curbrk"), None);
    }
}
