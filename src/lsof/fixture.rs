//! Synthetic kernel images for the lsof tests
//!
//! Structures are bump-allocated into a raw capture and addressed through the 4-level
//! direct map, so `MemoryTranslator::new(raw_regions(..))` resolves every pointer.
use crate::kernel::layout::FileLayout;
use crate::kernel::{KernelReader, ProcessInfo};
use crate::memory::raw_regions;
use crate::symbols::SymbolResolver;
use crate::translation::{MemoryTranslator, PAGE_OFFSET};

const TASK_SIZE: usize = 0x30;
const TASK_TASKS: usize = 0x10;
const TASK_PID: usize = 0x18;
const TASK_COMM: usize = 0x20;
const DENTRY_SIZE: usize = 0x28;
const MOUNT_SIZE: usize = 0x18;

/// Compact layout: every structure only has the fields the walk reads
pub fn test_layout() -> FileLayout {
    FileLayout {
        task_files: 0x0,
        task_fs: 0x8,
        files_fdt: 0x0,
        fdt_max_fds: 0x0,
        fdt_fd: 0x8,
        file_mnt: 0x0,
        file_dentry: 0x8,
        file_mode: 0x10,
        fs_root_mnt: 0x0,
        fs_root_dentry: 0x8,
        dentry_parent: 0x0,
        dentry_hash_pprev: 0x8,
        dentry_name_len: 0x10,
        dentry_name_ptr: 0x18,
        dentry_inode: 0x20,
        inode_ino: 0x0,
        mount_parent: 0x0,
        mount_mountpoint: 0x8,
        mount_mnt: 0x10,
        vfsmount_root: 0x0,
    }
}

/// Kernel structure offsets that resolve to `test_layout()`, plus the task list fields
pub fn test_symbols() -> SymbolResolver {
    let mut symbols = SymbolResolver::new();
    for (struct_name, field_name, offset) in [
        ("task_struct", "files", 0x0),
        ("task_struct", "fs", 0x8),
        ("task_struct", "tasks", TASK_TASKS),
        ("task_struct", "pid", TASK_PID),
        ("task_struct", "comm", TASK_COMM),
        ("files_struct", "fdt", 0x0),
        ("fdtable", "max_fds", 0x0),
        ("fdtable", "fd", 0x8),
        ("file", "f_path", 0x0),
        ("file", "f_mode", 0x10),
        ("path", "mnt", 0x0),
        ("path", "dentry", 0x8),
        ("fs_struct", "root", 0x0),
        ("dentry", "d_parent", 0x0),
        ("dentry", "d_hash", 0x8),
        ("hlist_bl_node", "pprev", 0x0),
        ("dentry", "d_name", 0x10),
        ("qstr", "len", 0x0),
        ("qstr", "name", 0x8),
        ("dentry", "d_inode", 0x20),
        ("inode", "i_ino", 0x0),
        ("mount", "mnt_parent", 0x0),
        ("mount", "mnt_mountpoint", 0x8),
        ("mount", "mnt", 0x10),
        ("vfsmount", "mnt_root", 0x0),
    ] {
        symbols.add_struct_offset(struct_name, field_name, offset);
    }
    symbols
}

pub struct ImageBuilder {
    bytes: Vec<u8>,
    layout: FileLayout,
}

/// A finished image, ready to be read
pub struct Fixture {
    bytes: Vec<u8>,
    translator: MemoryTranslator,
    pub layout: FileLayout,
}

impl Fixture {
    pub fn reader(&self) -> KernelReader<'_> {
        KernelReader::new(&self.bytes, &self.translator)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn translator(&self) -> &MemoryTranslator {
        &self.translator
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        ImageBuilder {
            // keep address 0 unused so no structure ever lives at a "NULL" offset
            bytes: vec![0u8; 0x40],
            layout: test_layout(),
        }
    }

    pub fn finish(self) -> Fixture {
        Fixture {
            translator: MemoryTranslator::new(raw_regions(self.bytes.len())),
            bytes: self.bytes,
            layout: self.layout,
        }
    }

    fn alloc(&mut self, size: usize) -> u64 {
        let at = (self.bytes.len() + 0xf) & !0xf;
        self.bytes.resize(at + size, 0);
        PAGE_OFFSET + at as u64
    }

    fn offset(vaddr: u64) -> usize {
        (vaddr - PAGE_OFFSET) as usize
    }

    pub fn write_u64(&mut self, vaddr: u64, value: u64) {
        let at = Self::offset(vaddr);
        self.bytes[at..at + 8].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn write_u32(&mut self, vaddr: u64, value: u32) {
        let at = Self::offset(vaddr);
        self.bytes[at..at + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// A hashed dentry. `parent: None` makes it its own parent (a filesystem root).
    pub fn dentry(&mut self, name: &str, parent: Option<u64>) -> u64 {
        let dentry = self.alloc(DENTRY_SIZE);
        let name_buf = self.alloc(name.len().max(1));
        let at = Self::offset(name_buf);
        self.bytes[at..at + name.len()].copy_from_slice(name.as_bytes());

        let l = self.layout.clone();
        self.write_u64(dentry + l.dentry_parent as u64, parent.unwrap_or(dentry));
        self.write_u64(dentry + l.dentry_hash_pprev as u64, dentry);
        self.write_u32(dentry + l.dentry_name_len as u64, name.len() as u32);
        self.write_u64(dentry + l.dentry_name_ptr as u64, name_buf);
        dentry
    }

    /// Chain of dentries under `parent`, returning the leaf
    pub fn dentry_path(&mut self, parent: u64, components: &[&str]) -> u64 {
        components
            .iter()
            .fold(parent, |parent, name| self.dentry(name, Some(parent)))
    }

    pub fn set_parent(&mut self, dentry: u64, parent: u64) {
        let field = self.layout.dentry_parent as u64;
        self.write_u64(dentry + field, parent);
    }

    pub fn set_unhashed(&mut self, dentry: u64) {
        let field = self.layout.dentry_hash_pprev as u64;
        self.write_u64(dentry + field, 0);
    }

    pub fn set_inode(&mut self, dentry: u64, ino: u64) {
        let inode = self.alloc(8);
        let l = self.layout.clone();
        self.write_u64(inode + l.inode_ino as u64, ino);
        self.write_u64(dentry + l.dentry_inode as u64, inode);
    }

    /// A `struct mount`; returns the address of its embedded vfsmount.
    /// `parent: None` makes it the namespace's root mount (its own parent).
    pub fn mount(&mut self, root: u64, parent: Option<(u64, u64)>) -> u64 {
        let mount = self.alloc(MOUNT_SIZE);
        let l = self.layout.clone();
        let vfsmnt = mount + l.mount_mnt as u64;
        match parent {
            Some((parent_vfsmnt, mountpoint)) => {
                self.write_u64(mount + l.mount_parent as u64, parent_vfsmnt - l.mount_mnt as u64);
                self.write_u64(mount + l.mount_mountpoint as u64, mountpoint);
            }
            None => {
                self.write_u64(mount + l.mount_parent as u64, mount);
                self.write_u64(mount + l.mount_mountpoint as u64, root);
            }
        }
        self.write_u64(vfsmnt + l.vfsmount_root as u64, root);
        vfsmnt
    }

    pub fn file(&mut self, mnt: u64, dentry: u64, mode: u32) -> u64 {
        let file = self.alloc(0x18);
        let l = self.layout.clone();
        self.write_u64(file + l.file_mnt as u64, mnt);
        self.write_u64(file + l.file_dentry as u64, dentry);
        self.write_u32(file + l.file_mode as u64, mode);
        file
    }

    /// files_struct -> fdtable -> fd array holding `slots`; `0` is a closed slot
    pub fn files(&mut self, slots: &[u64], max_fds: u32) -> u64 {
        let array = self.alloc(slots.len().max(1) * 8);
        for (i, &slot) in slots.iter().enumerate() {
            self.write_u64(array + (i * 8) as u64, slot);
        }
        self.fdtable(array, max_fds)
    }

    /// files_struct -> fdtable with an explicit fd array pointer
    pub fn fdtable(&mut self, fd_array: u64, max_fds: u32) -> u64 {
        let l = self.layout.clone();
        let fdt = self.alloc(0x10);
        self.write_u32(fdt + l.fdt_max_fds as u64, max_fds);
        self.write_u64(fdt + l.fdt_fd as u64, fd_array);
        let files = self.alloc(0x8);
        self.write_u64(files + l.files_fdt as u64, fdt);
        files
    }

    /// Like `files`, but the fd array is the last thing in the image so that slots past
    /// `slots.len()` fall off the end of the capture. Allocate everything else first.
    pub fn files_at_end(&mut self, slots: &[u64], max_fds: u32) -> u64 {
        let files = self.fdtable(0, max_fds);
        let fdt = self.read_u64(files + self.layout.files_fdt as u64);
        let array = self.alloc(slots.len() * 8);
        for (i, &slot) in slots.iter().enumerate() {
            self.write_u64(array + (i * 8) as u64, slot);
        }
        let field = self.layout.fdt_fd as u64;
        self.write_u64(fdt + field, array);
        files
    }

    pub fn set_files(&mut self, task: &ProcessInfo, files: u64) {
        let at = PAGE_OFFSET + task.offset + self.layout.task_files as u64;
        self.write_u64(at, files);
    }

    fn read_u64(&self, vaddr: u64) -> u64 {
        let at = Self::offset(vaddr);
        u64::from_ne_bytes(self.bytes[at..at + 8].try_into().unwrap())
    }

    pub fn fs_struct(&mut self, mnt: u64, dentry: u64) -> u64 {
        let fs = self.alloc(0x10);
        let l = self.layout.clone();
        self.write_u64(fs + l.fs_root_mnt as u64, mnt);
        self.write_u64(fs + l.fs_root_dentry as u64, dentry);
        fs
    }

    pub fn task(&mut self, pid: i32, comm: &str, files: u64, fs: u64) -> ProcessInfo {
        let task = self.alloc(TASK_SIZE);
        let l = self.layout.clone();
        self.write_u64(task + l.task_files as u64, files);
        self.write_u64(task + l.task_fs as u64, fs);
        self.write_u32(task + TASK_PID as u64, pid as u32);
        let at = Self::offset(task) + TASK_COMM;
        let len = comm.len().min(15);
        self.bytes[at..at + len].copy_from_slice(&comm.as_bytes()[..len]);
        ProcessInfo {
            offset: Self::offset(task) as u64,
            pid,
            comm: comm.to_string(),
        }
    }

    /// Chain tasks into a circular `tasks` list in the order given
    pub fn link_tasks(&mut self, tasks: &[ProcessInfo]) {
        for (i, task) in tasks.iter().enumerate() {
            let next = &tasks[(i + 1) % tasks.len()];
            let list_head = PAGE_OFFSET + task.offset + TASK_TASKS as u64;
            self.write_u64(list_head, PAGE_OFFSET + next.offset + TASK_TASKS as u64);
        }
    }
}

/// A root filesystem: `/` dentry plus its root mount, as (vfsmount, root dentry)
pub fn rootfs(image: &mut ImageBuilder) -> (u64, u64) {
    let root = image.dentry("/", None);
    let mnt = image.mount(root, None);
    (mnt, root)
}
