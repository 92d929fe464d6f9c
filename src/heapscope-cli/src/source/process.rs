//! Live Process Memory Source
//!
//! Memory source implementation for reading from a running Linux process.

use super::elf::{find_auxv_value, pointer_width, AT_PAGESZ};
use super::maps::parse_maps;

use anyhow::{bail, Context, Result};
use heapscope::source::DEFAULT_PAGE_SIZE;
use heapscope::{MemoryRegion, MemorySource};
use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use sysinfo::System;

/// An attached process
pub struct LiveProcess {
    pub pid: u32,
    pub handle: ProcessHandle,
    pub exe_path: PathBuf,
    pub maps: Vec<MemoryRegion>,
    pointer_width: usize,
    page_size: u64,
}

impl MemorySource for LiveProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(address)
            .with_context(|| format!("Address {:#x} out of range", address))?;
        self.ensure_mapped(address, size)?;
        let mut buffer = vec![0u8; size];
        self.handle
            .copy_address(start, &mut buffer)
            .with_context(|| format!("Failed to read {} bytes at {:#x}", size, address))?;
        Ok(buffer)
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.maps
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn pointer_width(&self) -> usize {
        self.pointer_width
    }
}

impl LiveProcess {
    /// Attach to a running process
    pub fn attach(pid: u32) -> Result<Self> {
        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .context("Failed to attach to process. Try running with sudo.")?;

        let maps = parse_maps(pid)?;

        let exe_path = std::fs::read_link(format!("/proc/{}/exe", pid))
            .unwrap_or_else(|_| PathBuf::from("unknown"));

        let pointer_width = read_pointer_width(pid)?;
        let page_size = read_page_size(pid, pointer_width).unwrap_or_else(|e| {
            tracing::debug!("Falling back to {} byte pages: {:#}", DEFAULT_PAGE_SIZE, e);
            DEFAULT_PAGE_SIZE
        });

        tracing::info!(
            "Attached to PID {} ({}, {}-bit, {} regions)",
            pid,
            exe_path.display(),
            pointer_width * 8,
            maps.len()
        );

        Ok(LiveProcess {
            pid,
            handle,
            exe_path,
            maps,
            pointer_width,
            page_size,
        })
    }

    /// Fail unless `[address, address + size)` lies in readable mappings.
    /// `process_vm_readv` reports a partial read as success, leaving the
    /// unread tail zeroed, so the range is checked against the maps first.
    fn ensure_mapped(&self, address: u64, size: usize) -> Result<()> {
        let end = address
            .checked_add(size as u64)
            .with_context(|| format!("Read of {} bytes at {:#x} wraps", size, address))?;
        let mut cursor = address;
        while cursor < end {
            match self.find_region(cursor) {
                Some(region) if region.is_readable() => cursor = region.end,
                Some(region) => bail!(
                    "Region {:#x}..{:#x} ({}) is not readable",
                    region.start,
                    region.end,
                    region.perms
                ),
                None => bail!("Address {:#x} is not mapped", cursor),
            }
        }
        Ok(())
    }

    /// Attach to the first process whose name matches
    pub fn attach_by_name(name: &str) -> Result<Self> {
        Self::attach(find_process(name)?)
    }
}

/// Pointer width from the ELF class of the process image
fn read_pointer_width(pid: u32) -> Result<usize> {
    let exe = format!("/proc/{}/exe", pid);
    let mut ident = [0u8; 16];
    File::open(&exe)
        .and_then(|mut f| f.read_exact(&mut ident))
        .with_context(|| format!("Failed to read ELF header of {}", exe))?;
    pointer_width(&ident).with_context(|| format!("Bad ELF header in {}", exe))
}

/// Page size from AT_PAGESZ in the auxiliary vector
fn read_page_size(pid: u32, pointer_width: usize) -> Result<u64> {
    let path = format!("/proc/{}/auxv", pid);
    let auxv = std::fs::read(&path).with_context(|| format!("Failed to read {}", path))?;
    find_auxv_value(&auxv, pointer_width, AT_PAGESZ)
        .filter(|&size| size.is_power_of_two())
        .with_context(|| format!("No AT_PAGESZ in {}", path))
}

/// Find a running process by name, preferring the largest
pub fn find_process(name: &str) -> Result<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    let mut candidates: Vec<(u32, u64)> = system
        .processes()
        .values()
        .filter(|process| process.name().to_string_lossy() == name)
        .map(|process| {
            let pid = process.pid().as_u32();
            (get_tgid(pid).unwrap_or(pid), process.memory())
        })
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.dedup_by(|a, b| a.0 == b.0);

    match candidates.first() {
        Some(&(pid, memory)) => {
            tracing::info!(
                "Found process {}: PID {} (memory: {} MB)",
                name,
                pid,
                memory / 1_000_000
            );
            Ok(pid)
        }
        None => bail!("No running process named {}", name),
    }
}

/// Thread group id of a task, so threads resolve to their process
fn get_tgid(pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_tgid(&status)
}

fn parse_tgid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Tgid:"))
        .and_then(|value| value.trim().parse().ok())
}
