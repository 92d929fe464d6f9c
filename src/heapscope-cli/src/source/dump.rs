//! Core Dump Memory Source
//!
//! Memory source implementation for reading from ELF core files (gcore or
//! kernel-written). Region names are not stored in a core, so a saved copy of
//! `/proc/pid/maps` is merged in when available.

use super::elf::{ElfImage, AT_PAGESZ, PF_R, PF_W, PF_X};
use super::maps::read_maps_file;

use anyhow::{bail, Context, Result};
use heapscope::source::DEFAULT_PAGE_SIZE;
use heapscope::{MemoryRegion, MemorySource};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One PT_LOAD segment of the core
#[derive(Debug, Clone, Copy)]
struct Segment {
    vaddr: u64,
    memsz: u64,
    offset: u64,
    filesz: u64,
}

/// Memory dump file source
pub struct CoreDump {
    /// Memory-mapped core file
    mmap: Mmap,
    segments: Vec<Segment>,
    regions: Vec<MemoryRegion>,
    pointer_width: usize,
    page_size: u64,
    /// Path to the dump file
    pub path: PathBuf,
}

impl CoreDump {
    /// Open a core file, naming its regions from `maps` or `<dump>.maps`
    pub fn open<P: AsRef<Path>>(path: P, maps: Option<&Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("Failed to open dump file: {:?}", path))?;

        // SAFETY: the file is opened read-only; the mapping is never written
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap dump file: {:?}", path))?;

        tracing::info!(
            "Opened dump file: {:?} ({} MB)",
            path,
            mmap.len() / 1_000_000
        );

        let (segments, mut regions, pointer_width, page_size) = {
            let elf = ElfImage::parse(&mmap)
                .with_context(|| format!("{:?} is not an ELF core file", path))?;
            if !elf.is_core() {
                bail!("{:?} is an ELF file but not a core dump", path);
            }
            let page_size = elf
                .auxv_value(AT_PAGESZ)?
                .filter(|size| size.is_power_of_two())
                .unwrap_or(DEFAULT_PAGE_SIZE);
            let (segments, regions) = load_segments(&elf, mmap.len() as u64);
            (segments, regions, elf.pointer_width(), page_size)
        };

        let maps_path = maps
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_maps_path(&path));
        if maps_path.exists() {
            let named = read_maps_file(&maps_path)?;
            let count = merge_region_names(&mut regions, &named);
            tracing::info!("Named {} regions from {:?}", count, maps_path);
        } else if maps.is_some() {
            bail!("Maps file not found: {:?}", maps_path);
        } else {
            tracing::warn!(
                "No maps file at {:?}; module and [heap] lookups will fail",
                maps_path
            );
        }

        Ok(CoreDump {
            mmap,
            segments,
            regions,
            pointer_width,
            page_size,
            path,
        })
    }

    fn segment_for(&self, address: u64) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| address >= s.vaddr && address - s.vaddr < s.memsz)
    }
}

impl MemorySource for CoreDump {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let segment = self
            .segment_for(address)
            .with_context(|| format!("Address {:#x} not in dump", address))?;

        let rel = address - segment.vaddr;
        let end = rel
            .checked_add(size as u64)
            .filter(|&end| end <= segment.memsz)
            .with_context(|| {
                format!(
                    "Read of {} bytes at {:#x} crosses end of segment {:#x}",
                    size, address, segment.vaddr
                )
            })?;
        if end > segment.filesz {
            bail!(
                "Address range {:#x}..{:#x} was not written to the dump",
                address,
                segment.vaddr.saturating_add(end)
            );
        }

        let bytes = segment
            .offset
            .checked_add(rel)
            .and_then(|start| usize::try_from(start).ok())
            .and_then(|start| Some(start..start.checked_add(size)?))
            .and_then(|range| self.mmap.get(range))
            .with_context(|| format!("Dump file truncated at {:#x}", address))?;
        Ok(bytes.to_vec())
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

/// PT_LOAD segments and their regions. File contents that would lie past the
/// end of the core are clipped off, so those addresses read as not dumped.
fn load_segments(elf: &ElfImage, file_len: u64) -> (Vec<Segment>, Vec<MemoryRegion>) {
    let mut segments = Vec::new();
    let mut regions = Vec::new();

    for ph in elf.load_segments() {
        if ph.memsz == 0 {
            continue;
        }
        let available = file_len.saturating_sub(ph.offset);
        if ph.filesz > available {
            tracing::warn!(
                "Segment {:#x} claims {:#x} file bytes at offset {:#x}; only {:#x} present",
                ph.vaddr,
                ph.filesz,
                ph.offset,
                available
            );
        }
        segments.push(Segment {
            vaddr: ph.vaddr,
            memsz: ph.memsz,
            offset: ph.offset,
            filesz: ph.filesz.min(available),
        });

        let perms = format!(
            "{}{}{}p",
            if ph.flags & PF_R != 0 { 'r' } else { '-' },
            if ph.flags & PF_W != 0 { 'w' } else { '-' },
            if ph.flags & PF_X != 0 { 'x' } else { '-' },
        );
        regions.push(MemoryRegion {
            start: ph.vaddr,
            end: ph.vaddr.saturating_add(ph.memsz),
            perms,
            offset: 0,
            path: None,
        });
    }

    (segments, regions)
}

/// `<dump>.maps` next to the dump file
fn default_maps_path(dump: &Path) -> PathBuf {
    let mut name = dump.as_os_str().to_owned();
    name.push(".maps");
    PathBuf::from(name)
}

/// Copy pathname and file offset onto segments with a matching start address
fn merge_region_names(regions: &mut [MemoryRegion], named: &[MemoryRegion]) -> usize {
    let mut count = 0;
    for region in regions.iter_mut() {
        if let Some(source) = named.iter().find(|n| n.start == region.start) {
            region.path = source.path.clone();
            region.offset = source.offset;
            count += 1;
        }
    }
    count
}
