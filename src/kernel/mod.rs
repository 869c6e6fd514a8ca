//! Kernel data structure parsing module
use crate::error::ReadError;
use crate::translation::MemoryTranslator;
use serde::Serialize;

pub mod layout;
pub mod process_extractor;

/// One task found by the process list walk.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub offset: u64, // File offset where the task_struct is found
    pub pid: i32,
    pub comm: String,
}

/// Helper functions for reading data from the mapped capture by file offset
pub struct KernelParser;

impl KernelParser {
    /// Read a u64 (8 bytes) at a given file offset.
    pub fn read_u64(mapped: &[u8], offset: usize) -> Option<u64> {
        let bytes = mapped.get(offset..offset.checked_add(8)?)?;
        Some(u64::from_ne_bytes(bytes.try_into().ok()?))
    }

    /// Read an i32 (4 bytes) at a given file offset.
    pub fn read_i32(mapped: &[u8], offset: usize) -> Option<i32> {
        let bytes = mapped.get(offset..offset.checked_add(4)?)?;
        Some(i32::from_ne_bytes(bytes.try_into().ok()?))
    }

    /// Read a u32 (4 bytes) at a given file offset.
    pub fn read_u32(mapped: &[u8], offset: usize) -> Option<u32> {
        let bytes = mapped.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_ne_bytes(bytes.try_into().ok()?))
    }

    /// Read a fixed-length, NUL-padded string at a given file offset.
    pub fn read_string(mapped: &[u8], offset: usize, length: usize) -> Option<String> {
        let slice = mapped.get(offset..offset.checked_add(length)?)?;
        let nul_pos = slice.iter().position(|&c| c == 0).unwrap_or(length);
        Some(String::from_utf8_lossy(&slice[..nul_pos]).to_string())
    }
}

/// Typed, bounds-checked view of kernel virtual memory in a capture.
///
/// Every read either succeeds or reports a `ReadError`; nothing here panics on a bad
/// pointer. Cheap to copy.
#[derive(Clone, Copy)]
pub struct KernelReader<'a> {
    mapped: &'a [u8],
    translator: &'a MemoryTranslator,
}

impl<'a> KernelReader<'a> {
    pub fn new(mapped: &'a [u8], translator: &'a MemoryTranslator) -> Self {
        KernelReader { mapped, translator }
    }

    /// Translate a virtual address to a file offset that lies inside the capture
    pub fn file_offset(&self, vaddr: u64) -> Result<usize, ReadError> {
        let offset = self
            .translator
            .virtual_to_file_offset(vaddr)
            .ok_or(ReadError::Unmapped(vaddr))?;
        match usize::try_from(offset) {
            Ok(o) if o < self.mapped.len() => Ok(o),
            _ => Err(ReadError::OutOfBounds(offset)),
        }
    }

    /// `base + field`, treating overflow as an unmapped address
    pub fn field_addr(base: u64, field: usize) -> Result<u64, ReadError> {
        base.checked_add(field as u64).ok_or(ReadError::Unmapped(base))
    }

    pub fn read_u64(&self, vaddr: u64) -> Result<u64, ReadError> {
        let offset = self.file_offset(vaddr)?;
        KernelParser::read_u64(self.mapped, offset).ok_or(ReadError::OutOfBounds(offset as u64))
    }

    pub fn read_u32(&self, vaddr: u64) -> Result<u32, ReadError> {
        let offset = self.file_offset(vaddr)?;
        KernelParser::read_u32(self.mapped, offset).ok_or(ReadError::OutOfBounds(offset as u64))
    }

    /// Read a pointer-sized field of the structure at `base`
    pub fn read_ptr_field(&self, base: u64, field: usize) -> Result<u64, ReadError> {
        self.read_u64(Self::field_addr(base, field)?)
    }

    /// Read a pointer-sized field of a structure located by file offset
    pub fn read_ptr_at(&self, file_offset: u64, field: usize) -> Result<u64, ReadError> {
        let offset = file_offset
            .checked_add(field as u64)
            .ok_or(ReadError::OutOfBounds(file_offset))?;
        usize::try_from(offset)
            .ok()
            .and_then(|o| KernelParser::read_u64(self.mapped, o))
            .ok_or(ReadError::OutOfBounds(offset))
    }

    /// Read `len` bytes starting at a virtual address
    pub fn read_bytes(&self, vaddr: u64, len: usize) -> Result<&'a [u8], ReadError> {
        let offset = self.file_offset(vaddr)?;
        offset
            .checked_add(len)
            .and_then(|end| self.mapped.get(offset..end))
            .ok_or(ReadError::OutOfBounds(offset as u64))
    }

    /// Whether a virtual address points into the capture
    pub fn is_readable(&self, vaddr: u64) -> bool {
        self.file_offset(vaddr).is_ok()
    }
}
