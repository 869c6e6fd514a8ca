//! Process list walk: the source of Process handles for the lsof scan
use crate::core::offsets::KernelVersion;
use crate::error::AnalysisError;
use crate::kernel::{KernelParser, ProcessInfo};
use crate::symbols::{is_plausible_comm, is_plausible_pid, SymbolResolver};
use crate::translation::MemoryTranslator;
use log::{debug, warn};
use std::collections::HashSet;

const COMM_SIZE: usize = 16;
const MAX_TASKS: usize = 10000;

/// Walks the circular `task_struct.tasks` list
pub struct ProcessExtractor {
    pid_offset: usize,
    comm_offset: usize,
    tasks_offset: usize,
}

impl ProcessExtractor {
    pub fn new(symbols: &SymbolResolver, version: Option<&KernelVersion>) -> Result<Self, AnalysisError> {
        let field = |name: &str| {
            symbols
                .get_struct_field_offset("task_struct", name, version)
                .ok_or_else(|| AnalysisError::SymbolNotFound(format!("task_struct::{}", name)))
        };
        Ok(ProcessExtractor {
            pid_offset: field("pid")?,
            comm_offset: field("comm")?,
            tasks_offset: field("tasks")?,
        })
    }

    /// Read pid and comm from the task_struct at a file offset
    pub fn extract_process_info(&self, mapped: &[u8], task_offset: u64) -> Option<ProcessInfo> {
        let base = usize::try_from(task_offset).ok()?;
        let pid = KernelParser::read_i32(mapped, base.checked_add(self.pid_offset)?)?;
        let comm = KernelParser::read_string(mapped, base.checked_add(self.comm_offset)?, COMM_SIZE)?;
        Some(ProcessInfo {
            offset: task_offset,
            pid,
            comm,
        })
    }

    /// Walk the process list hanging off init_task
    ///
    /// Starts at `init_task.tasks.next`, so init_task itself is not returned. Stops when
    /// the list returns to a task already visited, on an unreadable or untranslatable
    /// `tasks.next`, or after `MAX_TASKS` entries.
    pub fn walk_process_list(
        &self,
        mapped: &[u8],
        translator: &MemoryTranslator,
        init_task_offset: u64,
    ) -> Vec<ProcessInfo> {
        let mut processes = Vec::new();
        let mut visited = HashSet::from([init_task_offset]);
        let mut next = self.next_task(mapped, translator, init_task_offset);

        while let Some(current) = next {
            if !visited.insert(current) {
                break;
            }
            if visited.len() > MAX_TASKS {
                warn!("Maximum iterations reached while walking process list");
                break;
            }

            match self.extract_process_info(mapped, current) {
                Some(process) if is_valid(&process) => processes.push(process),
                Some(process) => debug!(
                    "Skipping implausible task at 0x{:x} (pid={}, comm={:?})",
                    current, process.pid, process.comm
                ),
                None => warn!("Failed to read task_struct at file offset 0x{:x}", current),
            }

            next = self.next_task(mapped, translator, current);
        }

        debug!("Process list walk found {} tasks", processes.len());
        processes
    }

    /// File offset of the task that `tasks.next` of the task at `task_offset` points to
    fn next_task(&self, mapped: &[u8], translator: &MemoryTranslator, task_offset: u64) -> Option<u64> {
        let list_head = task_offset.checked_add(self.tasks_offset as u64)?;
        let next_ptr = match KernelParser::read_u64(mapped, usize::try_from(list_head).ok()?) {
            Some(0) | None => {
                warn!("Unreadable or NULL tasks.next at file offset 0x{:x}", list_head);
                return None;
            }
            Some(next) => next,
        };

        // tasks.next points at the list_head embedded in the next task_struct
        match translator.virtual_to_file_offset(next_ptr) {
            Some(offset) => Some(offset.saturating_sub(self.tasks_offset as u64)),
            None => {
                warn!("Failed to translate tasks.next 0x{:x}", next_ptr);
                None
            }
        }
    }
}

/// PID 0 (swapper) is accepted as-is; other tasks need a printable comm.
fn is_valid(process: &ProcessInfo) -> bool {
    is_plausible_pid(process.pid) && (process.pid == 0 || is_plausible_comm(&process.comm))
}
