//! Payload classification.
//!
//! Best-effort guess at what a chunk holds, checked in order:
//! 1. NUL-terminated ASCII text starting at the payload
//! 2. NUL-terminated UTF-16LE text starting at the payload
//! 3. A known file signature at offset 0
//!
//! Anything else stays [`Annotation::Empty`] and is left to the pointer scanner.

use crate::block::{Annotation, Signature};
use crate::source::MemorySource;

/// Upper bound on payload bytes inspected per chunk
pub const MAX_CLASSIFY_BYTES: u64 = 0x10000;

/// Classify the payload at `[payload_start, payload_start + payload_len)`
pub fn classify(
    source: &dyn MemorySource,
    payload_start: u64,
    payload_len: u64,
    min_string_length: usize,
) -> Annotation {
    let len = payload_len.min(MAX_CLASSIFY_BYTES) as usize;
    if len == 0 {
        return Annotation::Empty;
    }

    match source.read_bytes(payload_start, len) {
        Ok(bytes) => classify_bytes(&bytes, min_string_length),
        Err(_) => Annotation::Empty,
    }
}

/// Classify an already-read payload
pub fn classify_bytes(payload: &[u8], min_string_length: usize) -> Annotation {
    let min = min_string_length.max(1);

    if let Some(text) = ascii_string(payload, min) {
        return Annotation::Ascii(text);
    }

    if let Some(text) = utf16_string(payload, min) {
        return Annotation::Utf16(text);
    }

    match signature(payload) {
        Some(sig) => Annotation::Signature(sig),
        None => Annotation::Empty,
    }
}

fn is_text_byte(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) || matches!(b, b'\t' | b'\n' | b'\r')
}

fn push_escaped(out: &mut String, b: u8) {
    match b {
        b'\t' => out.push_str("\\t"),
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        _ => out.push(b as char),
    }
}

/// Printable run from the start of `payload` up to a NUL or the payload end
fn ascii_string(payload: &[u8], min: usize) -> Option<String> {
    let end = memchr::memchr(0, payload).unwrap_or(payload.len());
    let run = &payload[..end];

    if run.len() < min || !run.iter().all(|&b| is_text_byte(b)) {
        return None;
    }

    let mut text = String::with_capacity(run.len());
    for &b in run {
        push_escaped(&mut text, b);
    }
    Some(text)
}

/// Same as [`ascii_string`] over little-endian 16-bit units
fn utf16_string(payload: &[u8], min: usize) -> Option<String> {
    let mut text = String::new();
    let mut count = 0;

    for unit in payload.chunks_exact(2) {
        match (unit[0], unit[1]) {
            (0, 0) => break,
            (lo, 0) if is_text_byte(lo) => {
                push_escaped(&mut text, lo);
                count += 1;
            }
            _ => return None,
        }
    }

    (count >= min).then_some(text)
}

fn signature(payload: &[u8]) -> Option<Signature> {
    Signature::TABLE
        .iter()
        .find(|(_, magic)| payload.starts_with(magic))
        .map(|(sig, _)| *sig)
}
