//! Memory Region Types
//!
//! Data structures for representing memory regions from /proc/pid/maps.

use serde::Serialize;

/// Name the kernel gives the brk-managed heap mapping
pub const HEAP_REGION_NAME: &str = "[heap]";

/// A memory region from /proc/pid/maps
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    /// Anonymous read/write region without a name
    pub fn anonymous(start: u64, end: u64) -> Self {
        MemoryRegion {
            start,
            end,
            perms: "rw-p".to_string(),
            offset: 0,
            path: None,
        }
    }

    /// Read/write region with a pathname column such as `[heap]`
    pub fn named(start: u64, end: u64, name: &str) -> Self {
        MemoryRegion {
            path: Some(name.to_string()),
            ..Self::anonymous(start, end)
        }
    }

    /// Pathname column, or an empty string for anonymous mappings
    pub fn name(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }
}
