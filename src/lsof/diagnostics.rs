//! Counters for everything the lsof walk recovered from instead of reporting
use serde::Serialize;
use std::fmt;

/// Conditions the walk recovers from locally. None of them stop a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileScanIssue {
    /// The task has no reachable descriptor table; it yields no rows.
    MissingDescriptorTable,
    /// A descriptor slot, or the file it points to, could not be read.
    CorruptSlot,
    /// The file has no naming chain; it is reported with a placeholder path.
    DetachedFile,
    /// The dentry walk hit its hop bound; the row carries a partial path.
    PathTruncated,
    /// A structure behind an open file could not be read; the row was dropped.
    UnreadableMemory,
}

/// Per-process (or merged, per-run) counts of `FileScanIssue`s.
///
/// A closed descriptor slot is not an issue and is never counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanDiagnostics {
    pub missing_tables: usize,
    pub corrupt_slots: usize,
    pub detached_files: usize,
    pub truncated_paths: usize,
    pub unreadable_rows: usize,
    /// Tables whose `max_fds` exceeded the walk limit and were clamped
    pub clamped_tables: usize,
}

impl ScanDiagnostics {
    pub fn record(&mut self, issue: FileScanIssue) {
        *self.counter(issue) += 1;
    }

    pub fn count(&self, issue: FileScanIssue) -> usize {
        match issue {
            FileScanIssue::MissingDescriptorTable => self.missing_tables,
            FileScanIssue::CorruptSlot => self.corrupt_slots,
            FileScanIssue::DetachedFile => self.detached_files,
            FileScanIssue::PathTruncated => self.truncated_paths,
            FileScanIssue::UnreadableMemory => self.unreadable_rows,
        }
    }

    fn counter(&mut self, issue: FileScanIssue) -> &mut usize {
        match issue {
            FileScanIssue::MissingDescriptorTable => &mut self.missing_tables,
            FileScanIssue::CorruptSlot => &mut self.corrupt_slots,
            FileScanIssue::DetachedFile => &mut self.detached_files,
            FileScanIssue::PathTruncated => &mut self.truncated_paths,
            FileScanIssue::UnreadableMemory => &mut self.unreadable_rows,
        }
    }

    pub fn merge(&mut self, other: &ScanDiagnostics) {
        self.missing_tables += other.missing_tables;
        self.corrupt_slots += other.corrupt_slots;
        self.detached_files += other.detached_files;
        self.truncated_paths += other.truncated_paths;
        self.unreadable_rows += other.unreadable_rows;
        self.clamped_tables += other.clamped_tables;
    }

    /// Rows that were lost: corrupt slots and unreadable rows
    pub fn skipped(&self) -> usize {
        self.corrupt_slots + self.unreadable_rows
    }
}

impl fmt::Display for ScanDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing tables: {}, corrupt slots: {}, unreadable rows: {}, detached files: {}, truncated paths: {}, clamped tables: {}",
            self.missing_tables,
            self.corrupt_slots,
            self.unreadable_rows,
            self.detached_files,
            self.truncated_paths,
            self.clamped_tables
        )
    }
}
