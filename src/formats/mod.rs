//! Output format module for the lsof tool
pub mod csv;
pub mod json;
pub mod jsonl;
pub mod text;
pub mod traits;

#[cfg(test)]
pub(crate) fn test_rows() -> Vec<crate::lsof::OpenFileInfo> {
    use crate::lsof::{decode_mode, FileMode, OpenFileInfo};

    [
        (0, FileMode::READ, "/dev/null"),
        (4, FileMode::READ | FileMode::WRITE, "/tmp/a,b"),
        (5, FileMode::READ | FileMode::CAN_READ, "pipe:[31337]"),
    ]
    .into_iter()
    .map(|(fd, mode, path)| OpenFileInfo {
        offset: 0x1c2d40,
        comm: "sshd".to_string(),
        pid: 812,
        fd,
        mode: decode_mode(mode.bits()),
        mode_bits: mode.bits(),
        flags: mode.flag_names(),
        path: path.to_string(),
    })
    .collect()
}
