//! Arguments shared by every command that reads a target

use clap::Args;
use std::path::PathBuf;

use super::parse_address;

/// Which process or dump to read
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Attach to a running process by PID
    #[arg(short, long, conflicts_with_all = ["name", "dump"])]
    pub pid: Option<u32>,

    /// Attach to the largest running process with this name
    #[arg(short, long, conflicts_with = "dump")]
    pub name: Option<String>,

    /// Read an ELF core dump instead of a live process
    #[arg(short, long)]
    pub dump: Option<PathBuf>,

    /// Saved /proc/<pid>/maps naming the dump's regions (default: <dump>.maps)
    #[arg(long, requires = "dump")]
    pub maps: Option<PathBuf>,

    /// Directory prepended to module paths when reading symbol tables
    #[arg(long)]
    pub sysroot: Option<PathBuf>,
}

/// Explicit heap bounds, bypassing discovery
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct BoundsArgs {
    /// First chunk address
    #[arg(long, value_parser = parse_address, requires = "end")]
    pub start: Option<u64>,

    /// One past the top chunk
    #[arg(long, value_parser = parse_address, requires = "start")]
    pub end: Option<u64>,
}
