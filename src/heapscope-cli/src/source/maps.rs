//! /proc/pid/maps parsing

use anyhow::{Context, Result};
use heapscope::MemoryRegion;
use std::fs;
use std::path::Path;

/// Parse /proc/pid/maps to get memory regions
pub fn parse_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let maps_path = format!("/proc/{}/maps", pid);
    read_maps_file(Path::new(&maps_path))
        .with_context(|| format!("Failed to open {}. Do you have permission?", maps_path))
}

/// Read a saved copy of /proc/pid/maps
pub fn read_maps_file(path: &Path) -> Result<Vec<MemoryRegion>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read maps file: {}", path.display()))?;
    Ok(parse_maps_text(&contents))
}

/// Parse the text of a maps file, skipping malformed lines
pub fn parse_maps_text(contents: &str) -> Vec<MemoryRegion> {
    contents.lines().filter_map(parse_maps_line).collect()
}

/// Parse one line: `start-end perms offset dev inode [path]`
pub fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.splitn(6, char::is_whitespace);
    let range = parts.next()?;
    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;

    let perms = parts.next().unwrap_or("").to_string();
    let offset = parts
        .next()
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .unwrap_or(0);
    // dev, inode
    parts.next();
    parts.next();
    let path = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(MemoryRegion {
        start,
        end,
        perms,
        offset,
        path,
    })
}
