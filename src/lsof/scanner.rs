//! Joins the descriptor walk, mode decoding and path resolution into rows
use crate::error::ReadError;
use crate::kernel::layout::FileLayout;
use crate::kernel::{KernelReader, ProcessInfo};
use crate::lsof::diagnostics::{FileScanIssue, ScanDiagnostics};
use crate::lsof::fdtable::{enumerate, FileRef};
use crate::lsof::mode::{decode_mode, FileMode};
use crate::lsof::path::{PathResolver, DEFAULT_MAX_PATH_DEPTH};
use crate::lsof::OpenFileInfo;
use log::{debug, trace};

#[derive(Debug, Clone, Copy)]
pub struct LsofConfig {
    /// Hop bound for each dentry walk
    pub max_path_depth: usize,
}

impl Default for LsofConfig {
    fn default() -> Self {
        LsofConfig {
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

/// Open files of a single process plus what was skipped along the way
#[derive(Debug, Clone)]
pub struct ProcessScan {
    pub process: ProcessInfo,
    pub entries: Vec<OpenFileInfo>,
    pub diagnostics: ScanDiagnostics,
}

pub struct LsofScanner<'a> {
    reader: KernelReader<'a>,
    layout: &'a FileLayout,
    config: LsofConfig,
}

impl<'a> LsofScanner<'a> {
    pub fn new(reader: KernelReader<'a>, layout: &'a FileLayout, config: LsofConfig) -> Self {
        LsofScanner {
            reader,
            layout,
            config,
        }
    }

    /// One row per occupied descriptor slot, in ascending fd order
    pub fn scan_process(&self, process: &ProcessInfo) -> ProcessScan {
        let resolver = PathResolver::for_process(
            self.reader,
            self.layout,
            process,
            self.config.max_path_depth,
        );
        let mut diagnostics = ScanDiagnostics::default();
        let mut entries = Vec::new();

        let mut descriptors = enumerate(self.reader, self.layout, process);
        for (file, fd) in descriptors.by_ref() {
            match self.describe(&resolver, process, file, fd) {
                Some((entry, issue)) => {
                    if let Some(issue) = issue {
                        diagnostics.record(issue);
                    }
                    entries.push(entry);
                }
                None => diagnostics.record(FileScanIssue::UnreadableMemory),
            }
        }
        diagnostics.merge(descriptors.diagnostics());

        trace!(
            "pid {} ({}): {} open files",
            process.pid,
            process.comm,
            entries.len()
        );
        ProcessScan {
            process: process.clone(),
            entries,
            diagnostics,
        }
    }

    /// Scan every process in order
    pub fn scan_all(&self, processes: &[ProcessInfo]) -> Vec<ProcessScan> {
        processes.iter().map(|p| self.scan_process(p)).collect()
    }

    fn describe(
        &self,
        resolver: &PathResolver,
        process: &ProcessInfo,
        file: FileRef,
        fd: u32,
    ) -> Option<(OpenFileInfo, Option<FileScanIssue>)> {
        let mode_bits = match self.read_mode(file) {
            Ok(bits) => bits,
            Err(e) => {
                debug!("pid {} fd {}: unreadable f_mode: {}", process.pid, fd, e);
                return None;
            }
        };
        let path = match resolver.resolve(file) {
            Ok(path) => path,
            Err(e) => {
                debug!("pid {} fd {}: unreadable path: {}", process.pid, fd, e);
                return None;
            }
        };

        let entry = OpenFileInfo {
            offset: process.offset,
            comm: process.comm.clone(),
            pid: process.pid,
            fd,
            mode: decode_mode(mode_bits),
            mode_bits,
            flags: FileMode::from_bits_retain(mode_bits).flag_names(),
            path: path.to_string(),
        };
        Some((entry, path.issue()))
    }

    fn read_mode(&self, file: FileRef) -> Result<u32, ReadError> {
        let addr = KernelReader::field_addr(file.addr(), self.layout.file_mode)?;
        self.reader.read_u32(addr)
    }
}
