//! Lsof plugin - lists the open files of every process
use crate::error::AnalysisError;
use crate::kernel::layout::FileLayout;
use crate::kernel::process_extractor::ProcessExtractor;
use crate::kernel::{KernelReader, ProcessInfo};
use crate::lsof::{LsofConfig, LsofScanner, ScanDiagnostics, DEFAULT_MAX_PATH_DEPTH};
use crate::plugins::plugin_trait::{AnalysisContext, ForensicPlugin, PluginOutput};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use regex::Regex;

/// Selects the processes whose files are listed
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    pub pid: Option<i32>,
    pub name: Option<Regex>,
}

impl ProcessFilter {
    pub fn new(pid: Option<i32>, name: Option<&str>) -> Result<Self, AnalysisError> {
        let name = name.map(Regex::new).transpose()?;
        Ok(ProcessFilter { pid, name })
    }

    pub fn matches(&self, process: &ProcessInfo) -> bool {
        self.pid.map_or(true, |pid| process.pid == pid)
            && self.name.as_ref().map_or(true, |re| re.is_match(&process.comm))
    }
}

pub struct LsofPlugin {
    pub filter: ProcessFilter,
    pub max_path_depth: usize,
    /// Draw a progress bar on stderr while scanning
    pub show_progress: bool,
}

impl Default for LsofPlugin {
    fn default() -> Self {
        LsofPlugin {
            filter: ProcessFilter::default(),
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            show_progress: false,
        }
    }
}

impl LsofPlugin {
    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::hidden());
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }
}

impl ForensicPlugin for LsofPlugin {
    fn name(&self) -> &str {
        "lsof"
    }

    fn description(&self) -> &str {
        "List open files per process (fd, mode, path)"
    }

    fn run(&self, context: &AnalysisContext) -> Result<PluginOutput, AnalysisError> {
        let extractor = ProcessExtractor::new(context.symbol_resolver, context.kernel_version)?;
        let layout = FileLayout::resolve(context.symbol_resolver, context.kernel_version)?;

        let processes: Vec<ProcessInfo> = extractor
            .walk_process_list(context.mapped, context.translator, context.init_task_offset)
            .into_iter()
            .filter(|p| self.filter.matches(p))
            .collect();
        info!("Scanning open files of {} processes", processes.len());

        let reader = KernelReader::new(context.mapped, context.translator);
        let scanner = LsofScanner::new(
            reader,
            &layout,
            LsofConfig {
                max_path_depth: self.max_path_depth,
            },
        );

        let bar = self.progress_bar(processes.len());
        let mut rows = Vec::new();
        let mut diagnostics = ScanDiagnostics::default();
        for process in &processes {
            bar.set_message(format!("{} ({})", process.comm, process.pid));
            let scan = scanner.scan_process(process);
            debug!(
                "pid {}: {} rows, {}",
                process.pid,
                scan.entries.len(),
                scan.diagnostics
            );
            diagnostics.merge(&scan.diagnostics);
            rows.extend(scan.entries);
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(PluginOutput::OpenFiles(rows, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsof::fixture::{rootfs, test_symbols, ImageBuilder};
    use crate::lsof::FileMode;

    fn process(pid: i32, comm: &str) -> ProcessInfo {
        ProcessInfo {
            offset: 0,
            pid,
            comm: comm.to_string(),
        }
    }

    #[test]
    fn test_filter_by_pid_and_name() {
        let all = ProcessFilter::default();
        assert!(all.matches(&process(1, "systemd")));

        let by_pid = ProcessFilter::new(Some(42), None).unwrap();
        assert!(by_pid.matches(&process(42, "sshd")));
        assert!(!by_pid.matches(&process(43, "sshd")));

        let by_name = ProcessFilter::new(None, Some("^ssh")).unwrap();
        assert!(by_name.matches(&process(7, "sshd")));
        assert!(!by_name.matches(&process(7, "bash")));

        let both = ProcessFilter::new(Some(7), Some("sh")).unwrap();
        assert!(both.matches(&process(7, "bash")));
        assert!(!both.matches(&process(8, "bash")));
    }

    #[test]
    fn test_invalid_name_pattern() {
        assert!(matches!(
            ProcessFilter::new(None, Some("(")),
            Err(AnalysisError::RegexError(_))
        ));
    }

    #[test]
    fn test_run_lists_open_files_of_each_process() {
        let mut image = ImageBuilder::new();
        let (mnt, root) = rootfs(&mut image);
        let fs = image.fs_struct(mnt, root);
        let passwd = image.dentry_path(root, &["etc", "passwd"]);
        let log = image.dentry_path(root, &["var", "log", "auth.log"]);
        let read = image.file(mnt, passwd, FileMode::READ.bits());
        let append = image.file(mnt, log, (FileMode::WRITE | FileMode::LSEEK).bits());

        let swapper = image.task(0, "swapper/0", 0, 0);
        let init_files = image.files(&[read], 1);
        let init = image.task(1, "systemd", init_files, fs);
        let sshd_files = image.files(&[0, 0, 0, append], 4);
        let sshd = image.task(812, "sshd", sshd_files, fs);
        let kthreadd = image.task(2, "kthreadd", 0, 0);
        image.link_tasks(&[swapper.clone(), init, sshd, kthreadd]);
        let fixture = image.finish();

        let symbols = test_symbols();
        let context = AnalysisContext {
            mapped: fixture.bytes(),
            translator: fixture.translator(),
            symbol_resolver: &symbols,
            kernel_version: None,
            init_task_offset: swapper.offset,
        };

        let PluginOutput::OpenFiles(rows, diagnostics) = LsofPlugin::default().run(&context).unwrap();
        let got: Vec<_> = rows
            .iter()
            .map(|r| (r.pid, r.fd, r.mode.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![(1, 0, "r--", "/etc/passwd"), (812, 3, "-w-", "/var/log/auth.log")]
        );
        assert_eq!(rows[1].comm, "sshd");
        // kthreadd has no descriptor table; swapper heads the list and is not scanned
        assert_eq!(diagnostics.missing_tables, 1);

        let plugin = LsofPlugin {
            filter: ProcessFilter::new(None, Some("^ssh")).unwrap(),
            ..LsofPlugin::default()
        };
        let PluginOutput::OpenFiles(rows, _) = plugin.run(&context).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pid, 812);
    }
}
