//! Field offsets of the structures walked to list open files
use crate::core::offsets::KernelVersion;
use crate::error::AnalysisError;
use crate::symbols::SymbolResolver;
use log::debug;

/// Offsets resolved once per run, so the per-descriptor walk never does a lookup.
///
/// Composite offsets (`file_dentry`, `dentry_name_ptr`, ...) are pre-added from the nested
/// structure offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub task_files: usize,
    pub task_fs: usize,
    pub files_fdt: usize,
    pub fdt_max_fds: usize,
    pub fdt_fd: usize,
    pub file_mnt: usize,
    pub file_dentry: usize,
    pub file_mode: usize,
    pub fs_root_mnt: usize,
    pub fs_root_dentry: usize,
    pub dentry_parent: usize,
    pub dentry_hash_pprev: usize,
    pub dentry_name_len: usize,
    pub dentry_name_ptr: usize,
    pub dentry_inode: usize,
    pub inode_ino: usize,
    pub mount_mnt: usize,
    pub mount_parent: usize,
    pub mount_mountpoint: usize,
    pub vfsmount_root: usize,
}

impl FileLayout {
    /// Resolve every offset through the symbol resolver's fallback chain
    pub fn resolve(
        symbols: &SymbolResolver,
        version: Option<&KernelVersion>,
    ) -> Result<Self, AnalysisError> {
        let field = |struct_name: &str, field_name: &str| {
            symbols
                .get_struct_field_offset(struct_name, field_name, version)
                .ok_or_else(|| {
                    AnalysisError::SymbolNotFound(format!("{}::{}", struct_name, field_name))
                })
        };

        let file_path = field("file", "f_path")?;
        let fs_root = field("fs_struct", "root")?;
        let path_mnt = field("path", "mnt")?;
        let path_dentry = field("path", "dentry")?;
        let d_name = field("dentry", "d_name")?;

        let layout = FileLayout {
            task_files: field("task_struct", "files")?,
            task_fs: field("task_struct", "fs")?,
            files_fdt: field("files_struct", "fdt")?,
            fdt_max_fds: field("fdtable", "max_fds")?,
            fdt_fd: field("fdtable", "fd")?,
            file_mnt: file_path + path_mnt,
            file_dentry: file_path + path_dentry,
            file_mode: field("file", "f_mode")?,
            fs_root_mnt: fs_root + path_mnt,
            fs_root_dentry: fs_root + path_dentry,
            dentry_parent: field("dentry", "d_parent")?,
            dentry_hash_pprev: field("dentry", "d_hash")? + field("hlist_bl_node", "pprev")?,
            dentry_name_len: d_name + field("qstr", "len")?,
            dentry_name_ptr: d_name + field("qstr", "name")?,
            dentry_inode: field("dentry", "d_inode")?,
            inode_ino: field("inode", "i_ino")?,
            mount_mnt: field("mount", "mnt")?,
            mount_parent: field("mount", "mnt_parent")?,
            mount_mountpoint: field("mount", "mnt_mountpoint")?,
            vfsmount_root: field("vfsmount", "mnt_root")?,
        };
        debug!("Resolved file layout: {:?}", layout);
        Ok(layout)
    }
}
