//! Collaborator Traits
//!
//! Every access to the target goes through these traits. Nothing here assumes
//! a "current process": callers pass concrete sources in at call time.

use super::MemoryRegion;
use crate::chunk::ChunkLayout;
use anyhow::{ensure, Result};

/// Page size assumed when the target does not report one
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Trait for reading memory from various sources (live process, dump file, etc.)
///
/// Reads may fail at any address (unmapped page, protection fault, process
/// gone). Callers treat a failed read as an expected outcome.
pub trait MemorySource: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Get the list of memory regions
    fn regions(&self) -> &[MemoryRegion];

    /// Page size of the target system
    fn page_size(&self) -> u64 {
        DEFAULT_PAGE_SIZE
    }

    /// Pointer width of the target process in bytes
    fn pointer_width(&self) -> usize;

    /// Chunk layout matching the target's pointer width
    fn layout(&self) -> crate::Result<ChunkLayout> {
        ChunkLayout::from_pointer_width(self.pointer_width())
    }

    /// Read one target word
    fn read_word(&self, address: u64, layout: ChunkLayout) -> Result<u64> {
        let bytes = self.read_bytes(address, layout.word_size())?;
        ensure!(
            bytes.len() == layout.word_size(),
            "Short read at {:#x}: got {} bytes",
            address,
            bytes.len()
        );
        Ok(layout.read_word(&bytes))
    }

    /// Find a region containing the given address
    fn find_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.contains(address))
    }

    /// First region whose pathname column equals `name`
    fn find_region_by_name(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.name() == name)
    }
}

/// A shared object loaded into the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// File name, e.g. `libc.so.6`
    pub name: String,
    /// Full path as reported by the target
    pub path: String,
}

impl Module {
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Module {
            name,
            path: path.to_string(),
        }
    }
}

/// Enumerates modules loaded into the target
pub trait ModuleLister {
    fn loaded_modules(&self) -> Vec<Module>;
}

/// Resolves `module::symbol` names to target addresses
pub trait SymbolResolver {
    fn find(&self, qualified_name: &str) -> Option<u64>;
}
