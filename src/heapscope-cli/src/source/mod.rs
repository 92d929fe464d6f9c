//! Target access for the CLI
//!
//! - `LiveProcess` reads a running process through process-memory
//! - `CoreDump` reads an ELF core file through a memory map
//! - `ElfSymbols` lists modules and resolves their symbols from disk

mod dump;
mod elf;
mod maps;
mod process;
mod symbols;

pub use dump::CoreDump;
pub use process::LiveProcess;
pub use symbols::ElfSymbols;
