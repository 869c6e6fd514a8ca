//! Memory module for handling LIME format and raw memory captures
use crate::error::AnalysisError;
use log::{debug, warn};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// LiME segment magic: bytes "EMiL" read as a little-endian u32.
const LIME_MAGIC: u32 = 0x4C694D45;
const LIME_HEADER_SIZE: usize = 32;

/// A physical memory range and where its bytes live in the capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub file_offset: u64,
}

impl MemoryRegion {
    /// Check if a physical address is within this region (inclusive end, as LiME records it)
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address <= self.end
    }

    /// Convert a physical address to a file offset within this region
    pub fn file_offset_of(&self, address: u64) -> Option<u64> {
        if self.contains(address) {
            Some(self.file_offset + (address - self.start))
        } else {
            None
        }
    }
}

/// Read-only mapping of a capture file.
pub struct MemoryMap {
    _file: File,
    pub mapped: Mmap,
}

impl MemoryMap {
    /// Map a capture file read-only
    pub fn new(file_path: &Path) -> Result<Self, AnalysisError> {
        let file = File::open(file_path)?;
        // The capture is never written through this mapping.
        let mapped = unsafe { Mmap::map(&file)? };
        debug!(
            "Mapped {} ({} bytes)",
            file_path.display(),
            mapped.len()
        );
        Ok(MemoryMap {
            _file: file,
            mapped,
        })
    }

    /// Check if the capture starts with a LiME segment header.
    pub fn is_lime(&self) -> bool {
        read_le_u32(&self.mapped, 0) == Some(LIME_MAGIC)
    }

    /// Parse every LiME segment header in the capture.
    ///
    /// Each segment is a 32-byte header followed by `end - start + 1` bytes of data:
    /// - magic (u32), version (u32)
    /// - start (u64), end (u64): physical range, inclusive
    /// - reserved (u64)
    ///
    /// Parsing stops at the first non-LiME header or at a segment that claims more data
    /// than the file holds.
    pub fn parse_lime_header(&self) -> Option<Vec<MemoryRegion>> {
        parse_lime_segments(&self.mapped)
    }

    /// Regions to translate against: LiME segments when present, otherwise the whole
    /// file as physical memory starting at 0.
    pub fn regions(&self) -> Vec<MemoryRegion> {
        if self.is_lime() {
            if let Some(regions) = self.parse_lime_header() {
                return regions;
            }
            warn!("LIME header detected, but no memory regions were found");
        }
        raw_regions(self.mapped.len())
    }

    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }
}

/// A raw capture: one region mapping physical 0.. onto file offset 0..
pub fn raw_regions(len: usize) -> Vec<MemoryRegion> {
    vec![MemoryRegion {
        start: 0,
        end: (len as u64).saturating_sub(1),
        file_offset: 0,
    }]
}

fn parse_lime_segments(mapped: &[u8]) -> Option<Vec<MemoryRegion>> {
    let mut regions = Vec::new();
    let mut offset = 0usize;

    while offset + LIME_HEADER_SIZE <= mapped.len() {
        if read_le_u32(mapped, offset) != Some(LIME_MAGIC) {
            break;
        }

        let (start, end) = match (read_le_u64(mapped, offset + 8), read_le_u64(mapped, offset + 16)) {
            (Some(start), Some(end)) if end >= start => (start, end),
            _ => {
                warn!("Malformed LiME segment header at file offset 0x{:x}", offset);
                break;
            }
        };

        let data_offset = offset + LIME_HEADER_SIZE;
        let region_size = match usize::try_from(end - start + 1) {
            Ok(size) if data_offset.checked_add(size).map_or(false, |e| e <= mapped.len()) => size,
            _ => {
                warn!(
                    "LiME segment 0x{:x}-0x{:x} runs past the end of the capture",
                    start, end
                );
                break;
            }
        };

        debug!(
            "LiME region {}: 0x{:x}-0x{:x} at file offset 0x{:x}",
            regions.len(),
            start,
            end,
            data_offset
        );
        regions.push(MemoryRegion {
            start,
            end,
            file_offset: data_offset as u64,
        });

        offset = data_offset + region_size;
    }

    if regions.is_empty() {
        None
    } else {
        Some(regions)
    }
}

fn read_le_u32(mapped: &[u8], offset: usize) -> Option<u32> {
    let bytes = mapped.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_le_u64(mapped: &[u8], offset: usize) -> Option<u64> {
    let bytes = mapped.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}
