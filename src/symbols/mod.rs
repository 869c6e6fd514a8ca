//! Symbol resolution module for finding kernel symbols and structure offsets
use crate::core::dwarf::{DwarfSymbols, LSOF_STRUCTS};
use crate::core::offsets::{self, KernelVersion, StructureOffsets};
use crate::error::AnalysisError;
use crate::kernel::KernelParser;
use crate::translation::MemoryTranslator;
use log::{debug, info, warn};
use memchr::memmem;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const COMM_SIZE: usize = 16;
const MAX_PID: i32 = 4194304; // PID_MAX_LIMIT on 64-bit
const MIN_KERNEL_ADDR: u64 = 0xffff800000000000;

/// Symbol resolver for kernel symbols and structure field offsets
pub struct SymbolResolver {
    symbols: HashMap<String, u64>,
    // "struct_name::field_name" -> offset, loaded from dwarf2json
    struct_offsets: HashMap<String, usize>,
}

impl SymbolResolver {
    pub fn new() -> Self {
        SymbolResolver {
            symbols: HashMap::new(),
            struct_offsets: HashMap::new(),
        }
    }

    pub fn add_symbol(&mut self, name: String, address: u64) {
        self.symbols.insert(name, address);
    }

    pub fn get_symbol_address(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Record a structure field offset, overriding the version tables
    pub fn add_struct_offset(&mut self, struct_name: &str, field_name: &str, offset: usize) {
        self.struct_offsets
            .insert(format!("{}::{}", struct_name, field_name), offset);
    }

    /// Load a symbol file, picking the parser from the file name:
    /// `.json` is dwarf2json, anything containing `kallsyms` is a kallsyms dump,
    /// everything else is System.map.
    pub fn load_symbols(&mut self, path: &Path) -> Result<(), AnalysisError> {
        let name = path.to_string_lossy();
        if name.ends_with(".json") {
            self.load_dwarf2json(path)
        } else if name.contains("kallsyms") {
            self.load_symbol_map(path, true)
        } else {
            self.load_symbol_map(path, false)
        }
    }

    /// Parse a System.map or kallsyms dump: `<hex address> <type> <name> [module]`.
    ///
    /// kallsyms dumps taken without privileges show zero addresses; those are skipped.
    pub fn load_symbol_map(&mut self, path: &Path, skip_zero: bool) -> Result<(), AnalysisError> {
        let reader = BufReader::new(File::open(path)?);
        let before = self.symbols.len();

        for line_result in reader.lines() {
            let line = line_result?;
            let mut parts = line.split_whitespace();
            let (address_str, symbol_type, symbol_name) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(t), Some(n)) => (a, t, n),
                _ => continue,
            };

            if symbol_type.len() != 1 {
                continue;
            }
            if let Ok(address) = u64::from_str_radix(address_str.trim_start_matches("0x"), 16) {
                if skip_zero && address == 0 {
                    continue;
                }
                self.add_symbol(symbol_name.to_string(), address);
            }
        }

        if self.symbols.len() == before {
            return Err(AnalysisError::SymbolError(format!(
                "No symbols found in {}",
                path.display()
            )));
        }
        info!(
            "Loaded {} symbols from {}",
            self.symbols.len() - before,
            path.display()
        );
        Ok(())
    }

    /// Load symbols and the lsof structure offsets from a dwarf2json file
    pub fn load_dwarf2json(&mut self, path: &Path) -> Result<(), AnalysisError> {
        let dwarf = DwarfSymbols::load_from_file(path)?;
        self.load_dwarf(&dwarf);
        Ok(())
    }

    fn load_dwarf(&mut self, dwarf: &DwarfSymbols) {
        for (name, addr) in dwarf.get_symbols() {
            self.add_symbol(name, addr);
        }

        for struct_name in LSOF_STRUCTS {
            match dwarf.get_struct_offsets(struct_name) {
                Some(fields) => {
                    debug!("Loaded {} fields for struct '{}'", fields.len(), struct_name);
                    for (field_name, offset) in fields {
                        self.add_struct_offset(struct_name, &field_name, offset);
                    }
                }
                None => warn!("No fields found for struct '{}' in dwarf2json", struct_name),
            }
        }
    }

    /// Get the offset of a field within a structure
    ///
    /// Fallback chain:
    /// 1. dwarf2json structure offsets
    /// 2. the offset table for the detected kernel version
    /// 3. hardcoded defaults
    pub fn get_struct_field_offset(
        &self,
        struct_name: &str,
        field_name: &str,
        kernel_version: Option<&KernelVersion>,
    ) -> Option<usize> {
        let key = format!("{}::{}", struct_name, field_name);
        if let Some(offset) = self.struct_offsets.get(&key) {
            return Some(*offset);
        }

        // qstr.len lives in an anonymous struct inside the hash_len union
        if struct_name == "qstr" && field_name == "len" {
            if let Some(hash_len) = self.struct_offsets.get("qstr::hash_len") {
                return Some(hash_len + 4);
            }
        }

        if let Some(version) = kernel_version {
            let db = StructureOffsets::for_kernel(version);
            if let Some(offset) = db.get_offset(struct_name, field_name) {
                return Some(offset);
            }
        }

        offsets::default_offset(struct_name, field_name)
    }

    /// Detect kernel version from the linux_banner string
    pub fn detect_kernel_version(&self, mapped: &[u8]) -> Option<KernelVersion> {
        let pattern = b"Linux version ";
        let match_pos = memmem::find(mapped, pattern)?;
        let slice = &mapped[match_pos + pattern.len()..];
        let end_pos = slice
            .iter()
            .take(256)
            .position(|&c| c == b'\n' || c == b'\r' || c == 0)
            .unwrap_or_else(|| slice.len().min(256));
        parse_kernel_version(&String::from_utf8_lossy(&slice[..end_pos]))
    }

    /// Find the file offset of init_task
    ///
    /// The init_task symbol is tried first; when it is missing or does not translate, the
    /// capture is scanned for a "swapper" comm belonging to a PID 0 task_struct.
    pub fn find_init_task(
        &self,
        mapped: &[u8],
        translator: &MemoryTranslator,
        kernel_version: Option<&KernelVersion>,
    ) -> Option<u64> {
        if let Some(addr) = self.get_symbol_address("init_task") {
            debug!("init_task symbol at 0x{:x}", addr);
            if let Some(file_offset) = translator.virtual_to_file_offset(addr) {
                return Some(file_offset);
            }
            warn!(
                "init_task symbol 0x{:x} does not translate, falling back to heuristic search",
                addr
            );
        }

        self.find_init_task_by_swapper_string(mapped, kernel_version)
    }

    fn find_init_task_by_swapper_string(
        &self,
        mapped: &[u8],
        kernel_version: Option<&KernelVersion>,
    ) -> Option<u64> {
        let field = |name: &str| self.get_struct_field_offset("task_struct", name, kernel_version);
        let (comm_offset, pid_offset, tasks_offset) = (field("comm")?, field("pid")?, field("tasks")?);

        let mut candidates = 0;
        for match_pos in memmem::Finder::new(b"swapper").find_iter(mapped) {
            candidates += 1;
            let task = match match_pos.checked_sub(comm_offset) {
                Some(task) => task,
                None => continue,
            };

            if KernelParser::read_i32(mapped, task + pid_offset) != Some(0) {
                continue;
            }
            let comm = KernelParser::read_string(mapped, task + comm_offset, COMM_SIZE)
                .unwrap_or_default();
            if !is_plausible_comm(&comm) {
                continue;
            }
            match KernelParser::read_u64(mapped, task + tasks_offset) {
                Some(next) if next >= MIN_KERNEL_ADDR && next != u64::MAX => {
                    debug!(
                        "init_task found by heuristic at file offset 0x{:x} (tasks.next=0x{:x})",
                        task, next
                    );
                    return Some(task as u64);
                }
                _ => continue,
            }
        }

        warn!(
            "Scanned {} 'swapper' occurrences, none matched init_task",
            candidates
        );
        None
    }
}

/// A comm field is plausible if it is non-empty and printable
pub fn is_plausible_comm(comm: &str) -> bool {
    let trimmed = comm.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii() && !c.is_control())
}

/// Check that a PID read from a task_struct is in range
pub fn is_plausible_pid(pid: i32) -> bool {
    (0..=MAX_PID).contains(&pid)
}

/// Parse kernel version from a version string like "5.15.0-91-generic (buildd@...)"
pub fn parse_kernel_version(version_str: &str) -> Option<KernelVersion> {
    let version_clean = version_str.split_whitespace().next()?;
    let mut parts = version_clean.splitn(3, '.');

    let major = parts.next()?.parse::<u32>().ok()?;
    let minor_part = parts.next()?;
    let minor_digits: String = minor_part.chars().take_while(|c| c.is_ascii_digit()).collect();
    let minor = minor_digits.parse::<u32>().ok()?;

    let (patch, extra) = match parts.next() {
        Some(rest) => {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            (digits.parse::<u32>().unwrap_or(0), rest[digits.len()..].to_string())
        }
        None => (0, minor_part[minor_digits.len()..].to_string()),
    };

    Some(KernelVersion {
        major,
        minor,
        patch,
        extra,
    })
}
