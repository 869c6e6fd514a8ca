//! Open file listing: descriptor tables, path reconstruction and `f_mode` decoding
use serde::Serialize;

pub mod diagnostics;
pub mod fdtable;
pub mod mode;
pub mod path;
pub mod scanner;

#[cfg(test)]
pub(crate) mod fixture;

pub use diagnostics::{FileScanIssue, ScanDiagnostics};
pub use fdtable::{enumerate, DescriptorIter, DescriptorTable, FileRef, MAX_FDS_LIMIT};
pub use mode::{decode_mode, FileMode};
pub use path::{resolve_path, PathResolver, PathRoot, ResolvedPath, DEFAULT_MAX_PATH_DEPTH};
pub use scanner::{LsofConfig, LsofScanner, ProcessScan};

/// One row of output: an occupied descriptor slot of one process
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OpenFileInfo {
    pub offset: u64, // File offset of the owning task_struct
    pub comm: String,
    pub pid: i32,
    pub fd: u32,
    pub mode: String,
    pub mode_bits: u32,
    pub flags: Vec<String>,
    pub path: String,
}
