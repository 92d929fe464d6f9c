//! Memory Source Abstraction
//!
//! Core abstractions for reading the target:
//! - `MemorySource` for raw reads and the region list
//! - `ModuleLister` / `SymbolResolver` for heap bounds discovery
//! - Mock sources for testing

#[cfg(test)]
mod mock;
mod region;
mod traits;

#[cfg(test)]
pub use mock::{MockMemorySource, MockSymbols};
pub use region::{MemoryRegion, HEAP_REGION_NAME};
pub use traits::{MemorySource, Module, ModuleLister, SymbolResolver, DEFAULT_PAGE_SIZE};
