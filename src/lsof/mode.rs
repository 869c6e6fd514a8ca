//! `file.f_mode` flags
use bitflags::bitflags;

bitflags! {
    /// FMODE_* bits from linux/fs.h
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileMode: u32 {
        const READ            = 0x1;
        const WRITE           = 0x2;
        const LSEEK           = 0x4;
        const PREAD           = 0x8;
        const PWRITE          = 0x10;
        const EXEC            = 0x20;
        const NDELAY          = 0x40;
        const EXCL            = 0x80;
        const WRITE_IOCTL     = 0x100;
        const HASH32          = 0x200;
        const HASH64          = 0x400;
        const NOCMTIME        = 0x800;
        const RANDOM          = 0x1000;
        const UNSIGNED_OFFSET = 0x2000;
        const PATH            = 0x4000;
        const ATOMIC_POS      = 0x8000;
        const WRITER          = 0x10000;
        const CAN_READ        = 0x20000;
        const CAN_WRITE       = 0x40000;
        const NONOTIFY        = 0x4000000;
    }
}

impl FileMode {
    /// Names of the known flags that are set, as `FMODE_<NAME>`
    pub fn flag_names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| format!("FMODE_{}", name))
            .collect()
    }
}

/// `rwx`-style token: one position each for READ, WRITE and EXEC, `-` when absent.
///
/// Total over `u32`; bits other than those three never change the result.
pub fn decode_mode(bits: u32) -> String {
    let mode = FileMode::from_bits_retain(bits);
    [
        (FileMode::READ, 'r'),
        (FileMode::WRITE, 'w'),
        (FileMode::EXEC, 'x'),
    ]
    .iter()
    .map(|&(flag, c)| if mode.contains(flag) { c } else { '-' })
    .collect()
}
