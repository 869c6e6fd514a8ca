//! Command-line argument parsing for the lsof tool
use crate::lsof::DEFAULT_MAX_PATH_DEPTH;
use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "linmemlsof")]
#[command(about = "List open files of every process in a Linux memory capture", long_about = None)]
pub struct Cli {
    /// Path to LiME or raw memory dump
    #[arg(value_name = "MEMORY_DUMP", required_unless_present = "list_plugins")]
    pub memory_dump: Option<std::path::PathBuf>,

    /// Path to symbol file (System.map, kallsyms, or dwarf2json)
    #[arg(short, long, value_name = "FILE")]
    pub symbols: Option<std::path::PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<std::path::PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output (status messages)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only list files of this PID
    #[arg(long)]
    pub pid: Option<i32>,

    /// Only list files of processes whose name matches this regex
    #[arg(long, value_name = "REGEX")]
    pub name: Option<String>,

    /// Maximum dentry hops per path before it is reported as truncated
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_PATH_DEPTH)]
    pub max_path_depth: usize,

    /// Physical load address of the kernel image, in hex (default 0x1000000)
    #[arg(long, value_name = "ADDR", value_parser = parse_hex)]
    pub phys_base: Option<u64>,

    /// Print skipped-entry counts to stderr after the listing
    #[arg(long)]
    pub stats: bool,

    /// List available plugins
    #[arg(short, long)]
    pub list_plugins: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Csv,
    Json,
    Jsonl,
}

fn parse_hex(value: &str) -> Result<u64, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_filters() {
        let cli = Cli::try_parse_from(["linmemlsof", "mem.lime"]).unwrap();
        assert_eq!(cli.max_path_depth, DEFAULT_MAX_PATH_DEPTH);
        assert!(cli.format == OutputFormatArg::Text);
        assert!(cli.pid.is_none());

        let cli = Cli::try_parse_from([
            "linmemlsof",
            "mem.lime",
            "-s",
            "kernel.json",
            "-f",
            "jsonl",
            "--pid",
            "812",
            "--name",
            "^ssh",
            "--max-path-depth",
            "32",
            "--phys-base",
            "0x2600000",
            "--stats",
        ])
        .unwrap();
        assert_eq!(cli.pid, Some(812));
        assert_eq!(cli.name.as_deref(), Some("^ssh"));
        assert_eq!(cli.max_path_depth, 32);
        assert_eq!(cli.phys_base, Some(0x2600000));
        assert!(cli.format == OutputFormatArg::Jsonl);
        assert!(cli.stats);
    }

    #[test]
    fn test_dump_required_unless_listing() {
        assert!(Cli::try_parse_from(["linmemlsof"]).is_err());
        assert!(Cli::try_parse_from(["linmemlsof", "-l"]).unwrap().list_plugins);
        assert!(Cli::try_parse_from(["linmemlsof", "m", "--phys-base", "zz"]).is_err());
    }
}
