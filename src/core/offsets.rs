//! Structure offset database for different kernel versions
//!
//! These are x86-64 fallbacks for captures analyzed without a dwarf2json file. Offsets
//! from a dwarf2json file always win (see `SymbolResolver::get_struct_field_offset`).
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub extra: String, // Additional version info like "-generic"
}

impl std::fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.major, self.minor, self.patch, self.extra
        )
    }
}

/// task_struct offsets that move between releases: pid, comm, tasks, fs, files
struct TaskOffsets {
    pid: usize,
    comm: usize,
    tasks: usize,
    fs: usize,
    files: usize,
}

const TASK_4_19: TaskOffsets = TaskOffsets {
    pid: 0x318,
    comm: 0x498,
    tasks: 0x0,
    fs: 0x638,
    files: 0x640,
};

const TASK_5_4: TaskOffsets = TaskOffsets {
    pid: 0x320,
    comm: 0x4a0,
    tasks: 0x0,
    fs: 0x6b0,
    files: 0x6b8,
};

const TASK_5_15: TaskOffsets = TaskOffsets {
    pid: 0x328,
    comm: 0x4a8,
    tasks: 0x0,
    fs: 0x6f0,
    files: 0x6f8,
};

const TASK_6_1: TaskOffsets = TaskOffsets {
    pid: 0x330,
    comm: 0x4b0,
    tasks: 0x0,
    fs: 0x740,
    files: 0x748,
};

/// Layouts of the VFS structures the lsof walk reads. Stable across 4.19 to 6.1 on x86-64.
const VFS_OFFSETS: &[(&str, &str, usize)] = &[
    ("files_struct", "fdt", 0x20),
    ("fdtable", "max_fds", 0x0),
    ("fdtable", "fd", 0x8),
    ("file", "f_path", 0x10),
    ("file", "f_mode", 0x44),
    ("path", "mnt", 0x0),
    ("path", "dentry", 0x8),
    ("dentry", "d_hash", 0x8),
    ("dentry", "d_parent", 0x18),
    ("dentry", "d_name", 0x20),
    ("dentry", "d_inode", 0x30),
    ("hlist_bl_node", "pprev", 0x8),
    ("qstr", "len", 0x4),
    ("qstr", "name", 0x8),
    ("inode", "i_ino", 0x40),
    ("fs_struct", "root", 0x18),
    ("mount", "mnt_parent", 0x10),
    ("mount", "mnt_mountpoint", 0x18),
    ("mount", "mnt", 0x20),
    ("vfsmount", "mnt_root", 0x0),
];

/// Structure to hold offset information for different kernel versions
pub struct StructureOffsets {
    kernel_version: Option<KernelVersion>,
    offsets: HashMap<String, HashMap<String, usize>>,
}

impl StructureOffsets {
    pub fn new() -> Self {
        Self {
            kernel_version: None,
            offsets: HashMap::new(),
        }
    }

    /// Get offsets for a specific kernel version
    pub fn for_kernel(version: &KernelVersion) -> Self {
        let mut db = Self::new();
        db.kernel_version = Some(version.clone());

        let task = match (version.major, version.minor) {
            (4, 19) => &TASK_4_19,
            (5, 4) => &TASK_5_4,
            (5, 15) => &TASK_5_15,
            (6, 1) => &TASK_6_1,
            _ => &TASK_5_15,
        };
        db.load(task);
        db
    }

    fn load(&mut self, task: &TaskOffsets) {
        self.insert("task_struct", "pid", task.pid);
        self.insert("task_struct", "comm", task.comm);
        self.insert("task_struct", "tasks", task.tasks);
        self.insert("task_struct", "fs", task.fs);
        self.insert("task_struct", "files", task.files);

        for &(struct_name, field_name, offset) in VFS_OFFSETS {
            self.insert(struct_name, field_name, offset);
        }
    }

    fn insert(&mut self, struct_name: &str, field_name: &str, offset: usize) {
        self.offsets
            .entry(struct_name.to_string())
            .or_default()
            .insert(field_name.to_string(), offset);
    }

    /// Get the offset of a field within a structure
    pub fn get_offset(&self, struct_name: &str, field_name: &str) -> Option<usize> {
        self.offsets.get(struct_name)?.get(field_name).copied()
    }

    pub fn get_kernel_version(&self) -> Option<&KernelVersion> {
        self.kernel_version.as_ref()
    }
}

/// Offset used when neither dwarf2json nor a version table knows the field
pub fn default_offset(struct_name: &str, field_name: &str) -> Option<usize> {
    match (struct_name, field_name) {
        ("task_struct", "pid") => Some(TASK_5_15.pid),
        ("task_struct", "comm") => Some(TASK_5_15.comm),
        ("task_struct", "tasks") => Some(TASK_5_15.tasks),
        ("task_struct", "fs") => Some(TASK_5_15.fs),
        ("task_struct", "files") => Some(TASK_5_15.files),
        _ => VFS_OFFSETS
            .iter()
            .find(|(s, f, _)| *s == struct_name && *f == field_name)
            .map(|&(_, _, offset)| offset),
    }
}
