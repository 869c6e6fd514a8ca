//! Descriptor table walk: `task->files->fdt->fd[0..max_fds]`
use crate::error::ReadError;
use crate::kernel::layout::FileLayout;
use crate::kernel::{KernelReader, ProcessInfo};
use crate::lsof::diagnostics::{FileScanIssue, ScanDiagnostics};
use log::{debug, warn};

/// Upper bound on slots walked per table (the kernel's default NR_OPEN)
pub const MAX_FDS_LIMIT: u32 = 1 << 20;

const POINTER_SIZE: u64 = 8;

/// Virtual address of a `struct file` in the capture.
///
/// Several slots, in one process or many, can hold the same `FileRef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileRef(pub u64);

impl FileRef {
    pub fn addr(&self) -> u64 {
        self.0
    }
}

/// Location and capacity of a process's fd array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTable {
    pub fd_array: u64,
    pub max_fds: u32,
}

impl DescriptorTable {
    /// Follow `task->files->fdt`. `Ok(None)` means the process has no table to walk.
    pub fn locate(
        reader: &KernelReader,
        layout: &FileLayout,
        process: &ProcessInfo,
    ) -> Result<Option<Self>, ReadError> {
        let files = reader.read_ptr_at(process.offset, layout.task_files)?;
        if files == 0 {
            return Ok(None);
        }
        let fdt = reader.read_ptr_field(files, layout.files_fdt)?;
        if fdt == 0 {
            return Ok(None);
        }
        let max_fds = reader.read_u32(KernelReader::field_addr(fdt, layout.fdt_max_fds)?)?;
        let fd_array = reader.read_ptr_field(fdt, layout.fdt_fd)?;
        if max_fds == 0 || fd_array == 0 {
            return Ok(None);
        }
        Ok(Some(DescriptorTable { fd_array, max_fds }))
    }
}

/// Lazily yields `(file, fd)` for each occupied slot, in ascending fd order.
///
/// Closed slots are skipped silently; unreadable slots and slots pointing outside the
/// capture are skipped and counted as `CorruptSlot`. Dropping the iterator early is fine.
pub struct DescriptorIter<'a> {
    reader: KernelReader<'a>,
    table: Option<DescriptorTable>,
    next_fd: u32,
    limit: u32,
    pid: i32,
    diagnostics: ScanDiagnostics,
}

impl<'a> DescriptorIter<'a> {
    /// What the walk recovered from so far
    pub fn diagnostics(&self) -> &ScanDiagnostics {
        &self.diagnostics
    }

    pub fn table(&self) -> Option<DescriptorTable> {
        self.table
    }

    fn read_slot(&self, fd: u32) -> Result<u64, ReadError> {
        let table = self.table.ok_or(ReadError::Unmapped(0))?;
        let slot = (fd as u64)
            .checked_mul(POINTER_SIZE)
            .and_then(|off| table.fd_array.checked_add(off))
            .ok_or(ReadError::Unmapped(table.fd_array))?;
        self.reader.read_u64(slot)
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = (FileRef, u32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_fd < self.limit {
            let fd = self.next_fd;
            self.next_fd += 1;

            match self.read_slot(fd) {
                Ok(0) => continue,
                Ok(file) if self.reader.is_readable(file) => return Some((FileRef(file), fd)),
                Ok(file) => {
                    debug!("pid {} fd {}: file 0x{:x} is outside the capture", self.pid, fd, file);
                    self.diagnostics.record(FileScanIssue::CorruptSlot);
                }
                Err(e) => {
                    debug!("pid {} fd {}: unreadable slot: {}", self.pid, fd, e);
                    self.diagnostics.record(FileScanIssue::CorruptSlot);
                }
            }
        }
        None
    }
}

/// Enumerate the open descriptors of one process.
///
/// A missing or unreadable table yields nothing and is recorded as
/// `MissingDescriptorTable`; kernel threads legitimately have no table.
pub fn enumerate<'a>(
    reader: KernelReader<'a>,
    layout: &FileLayout,
    process: &ProcessInfo,
) -> DescriptorIter<'a> {
    let mut diagnostics = ScanDiagnostics::default();

    let table = match DescriptorTable::locate(&reader, layout, process) {
        Ok(table) => table,
        Err(e) => {
            debug!("pid {}: descriptor table unreadable: {}", process.pid, e);
            None
        }
    };

    let limit = match table {
        Some(t) if t.max_fds > MAX_FDS_LIMIT => {
            warn!(
                "pid {}: max_fds {} exceeds {}, walking only the first {} slots",
                process.pid, t.max_fds, MAX_FDS_LIMIT, MAX_FDS_LIMIT
            );
            diagnostics.clamped_tables += 1;
            MAX_FDS_LIMIT
        }
        Some(t) => t.max_fds,
        None => {
            diagnostics.record(FileScanIssue::MissingDescriptorTable);
            0
        }
    };

    DescriptorIter {
        reader,
        table,
        next_fd: 0,
        limit,
        pid: process.pid,
        diagnostics,
    }
}
