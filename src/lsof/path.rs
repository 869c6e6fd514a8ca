//! Rebuilds the path of an open file by walking its dentry chain up to the process root
use crate::error::ReadError;
use crate::kernel::layout::FileLayout;
use crate::kernel::{KernelReader, ProcessInfo};
use crate::lsof::diagnostics::FileScanIssue;
use crate::lsof::fdtable::FileRef;
use log::debug;
use std::fmt;

/// Default hop bound for a dentry walk
pub const DEFAULT_MAX_PATH_DEPTH: usize = 256;

/// Rendering of a file with no naming chain
pub const DETACHED_PATH: &str = "[detached]";

/// Prefix of a path cut short by the hop bound
pub const TRUNCATED_MARKER: &str = "<truncated>";

const NAME_MAX: usize = 255;

/// Pseudo filesystems whose names are shown bare (`pipe:[1234]`), not as `/pipe:[1234]`
const PSEUDO_PREFIXES: &[&str] = &["pipe:", "socket:", "anon_inode:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    Path(String),
    /// Unlinked while open, or no dentry at all
    Detached,
    /// The hop bound was hit; `partial` holds the components gathered so far
    Truncated { partial: String },
}

impl ResolvedPath {
    pub fn issue(&self) -> Option<FileScanIssue> {
        match self {
            ResolvedPath::Path(_) => None,
            ResolvedPath::Detached => Some(FileScanIssue::DetachedFile),
            ResolvedPath::Truncated { .. } => Some(FileScanIssue::PathTruncated),
        }
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedPath::Path(path) => f.write_str(path),
            ResolvedPath::Detached => f.write_str(DETACHED_PATH),
            ResolvedPath::Truncated { partial } => write!(f, "{}{}", TRUNCATED_MARKER, partial),
        }
    }
}

/// `(vfsmount, dentry)` pair at which a walk stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRoot {
    pub mnt: u64,
    pub dentry: u64,
}

impl PathRoot {
    /// `task->fs->root`. `Ok(None)` for tasks without an fs_struct (kernel threads).
    pub fn of_process(
        reader: &KernelReader,
        layout: &FileLayout,
        process: &ProcessInfo,
    ) -> Result<Option<Self>, ReadError> {
        let fs = reader.read_ptr_at(process.offset, layout.task_fs)?;
        if fs == 0 {
            return Ok(None);
        }
        let mnt = reader.read_ptr_field(fs, layout.fs_root_mnt)?;
        let dentry = reader.read_ptr_field(fs, layout.fs_root_dentry)?;
        if dentry == 0 {
            return Ok(None);
        }
        Ok(Some(PathRoot { mnt, dentry }))
    }
}

/// Resolves file paths as seen from one process's root
pub struct PathResolver<'a> {
    reader: KernelReader<'a>,
    layout: &'a FileLayout,
    root: Option<PathRoot>,
    max_depth: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        reader: KernelReader<'a>,
        layout: &'a FileLayout,
        root: Option<PathRoot>,
        max_depth: usize,
    ) -> Self {
        PathResolver {
            reader,
            layout,
            root,
            max_depth,
        }
    }

    /// Resolver rooted at `task->fs->root`. An unreadable fs_struct falls back to walking
    /// up to the namespace's root mount.
    pub fn for_process(
        reader: KernelReader<'a>,
        layout: &'a FileLayout,
        process: &ProcessInfo,
        max_depth: usize,
    ) -> Self {
        let root = PathRoot::of_process(&reader, layout, process).unwrap_or_else(|e| {
            debug!("pid {}: unreadable fs root: {}", process.pid, e);
            None
        });
        Self::new(reader, layout, root, max_depth)
    }

    pub fn root(&self) -> Option<PathRoot> {
        self.root
    }

    pub fn resolve(&self, file: FileRef) -> Result<ResolvedPath, ReadError> {
        let l = self.layout;
        let leaf = self.reader.read_ptr_field(file.addr(), l.file_dentry)?;
        if leaf == 0 || self.is_unlinked(leaf)? {
            return Ok(ResolvedPath::Detached);
        }

        let mut dentry = leaf;
        let mut mnt = self.reader.read_ptr_field(file.addr(), l.file_mnt)?;
        let mut components = Vec::new();
        let mut hops = 0;

        loop {
            if self.root == Some(PathRoot { mnt, dentry }) {
                break;
            }
            if hops >= self.max_depth {
                debug!("dentry walk from 0x{:x} exceeded {} hops", leaf, self.max_depth);
                return Ok(ResolvedPath::Truncated {
                    partial: format!("/{}", join(&components)),
                });
            }
            hops += 1;

            let parent = self.reader.read_ptr_field(dentry, l.dentry_parent)?;
            if parent == 0 {
                // parentless dentry: treat as the root, contributing no name
                break;
            }
            components.push(self.read_name(dentry)?);

            if parent == dentry || dentry == self.mount_root(mnt)? {
                // top of this mount: continue from its mountpoint in the parent mount
                match self.mount_parent(mnt)? {
                    Some((mountpoint, parent_mnt)) => {
                        dentry = mountpoint;
                        mnt = parent_mnt;
                        continue;
                    }
                    None => break,
                }
            }
            dentry = parent;
        }

        self.finish(join(&components), leaf).map(ResolvedPath::Path)
    }

    /// The kernel's `d_unlinked`: unhashed and not a filesystem root
    fn is_unlinked(&self, dentry: u64) -> Result<bool, ReadError> {
        let parent = self.reader.read_ptr_field(dentry, self.layout.dentry_parent)?;
        if parent == 0 || parent == dentry {
            return Ok(false);
        }
        let pprev = self.reader.read_ptr_field(dentry, self.layout.dentry_hash_pprev)?;
        Ok(pprev == 0)
    }

    /// One path component from `d_name`, with surrounding `/` removed
    fn read_name(&self, dentry: u64) -> Result<String, ReadError> {
        let len_addr = KernelReader::field_addr(dentry, self.layout.dentry_name_len)?;
        let len = (self.reader.read_u32(len_addr)? as usize).min(NAME_MAX);
        if len == 0 {
            return Ok(String::new());
        }
        let name_ptr = self.reader.read_ptr_field(dentry, self.layout.dentry_name_ptr)?;
        let bytes = self.reader.read_bytes(name_ptr, len)?;
        let name = String::from_utf8_lossy(bytes);
        Ok(name.trim_matches('/').to_string())
    }

    fn mount_root(&self, mnt: u64) -> Result<u64, ReadError> {
        if mnt == 0 {
            return Ok(0);
        }
        self.reader.read_ptr_field(mnt, self.layout.vfsmount_root)
    }

    /// `(mnt_mountpoint, parent vfsmount)` of the mount embedding `mnt`, or `None` at the
    /// namespace's root mount
    fn mount_parent(&self, mnt: u64) -> Result<Option<(u64, u64)>, ReadError> {
        let mount = match mnt.checked_sub(self.layout.mount_mnt as u64) {
            Some(mount) if mnt != 0 => mount,
            _ => return Ok(None),
        };
        let parent = self.reader.read_ptr_field(mount, self.layout.mount_parent)?;
        if parent == 0 || parent == mount {
            return Ok(None);
        }
        let mountpoint = self.reader.read_ptr_field(mount, self.layout.mount_mountpoint)?;
        if mountpoint == 0 {
            return Ok(None);
        }
        let parent_mnt = KernelReader::field_addr(parent, self.layout.mount_mnt)?;
        Ok(Some((mountpoint, parent_mnt)))
    }

    fn finish(&self, joined: String, leaf: u64) -> Result<String, ReadError> {
        if PSEUDO_PREFIXES.iter().any(|p| joined.starts_with(p)) {
            if joined.contains(']') {
                return Ok(joined);
            }
            return Ok(match self.inode_number(leaf)? {
                Some(ino) => format!("{}:[{}]", joined.trim_end_matches(':'), ino),
                None => joined,
            });
        }
        if joined == "inotify" {
            return Ok(joined);
        }
        Ok(format!("/{}", joined))
    }

    fn inode_number(&self, dentry: u64) -> Result<Option<u64>, ReadError> {
        let inode = self.reader.read_ptr_field(dentry, self.layout.dentry_inode)?;
        if inode == 0 {
            return Ok(None);
        }
        self.reader.read_ptr_field(inode, self.layout.inode_ino).map(Some)
    }
}

/// Components are collected leaf first; join them root first, dropping empty ones
fn join(components: &[String]) -> String {
    components
        .iter()
        .rev()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve the path of `file` as seen by `process`
pub fn resolve_path(
    reader: KernelReader,
    layout: &FileLayout,
    process: &ProcessInfo,
    file: FileRef,
    max_depth: usize,
) -> Result<ResolvedPath, ReadError> {
    PathResolver::for_process(reader, layout, process, max_depth).resolve(file)
}
