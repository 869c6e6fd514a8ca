//! Main entry point for the Linux memory lsof tool
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use linuxmemlsof::cli::args::{Cli, OutputFormatArg};
use linuxmemlsof::error::AnalysisError;
use linuxmemlsof::formats::traits::{OutputDestination, OutputFormat, OutputWriter};
use linuxmemlsof::memory::MemoryMap;
use linuxmemlsof::plugins::plugin_trait::{AnalysisContext, ForensicPlugin, PluginOutput};
use linuxmemlsof::plugins::{available_plugins, LsofPlugin, ProcessFilter};
use linuxmemlsof::symbols::SymbolResolver;
use linuxmemlsof::translation::MemoryTranslator;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.list_plugins {
        println!("Available plugins:");
        for plugin in available_plugins() {
            println!("  {} - {}", plugin.name(), plugin.description());
        }
        return Ok(());
    }

    let dump = cli
        .memory_dump
        .as_deref()
        .context("no memory dump given")?;
    info!("Opening memory capture file: {}", dump.display());
    let memory_map = MemoryMap::new(dump)
        .with_context(|| format!("failed to open memory capture {}", dump.display()))?;

    if memory_map.is_lime() {
        info!("LiME header detected");
    } else {
        info!("No LiME header found; assuming raw memory capture");
    }
    let regions = memory_map.regions();
    for (i, region) in regions.iter().enumerate() {
        info!(
            "Region {}: Start: 0x{:x}, End: 0x{:x}, FileOffset: 0x{:x}",
            i, region.start, region.end, region.file_offset
        );
    }

    let mut translator = MemoryTranslator::new(regions);
    if let Some(phys_base) = cli.phys_base {
        translator.set_phys_base(phys_base);
    }
    info!(
        "Memory translator initialized with {} regions (phys_base 0x{:x})",
        translator.region_count(),
        translator.phys_base()
    );

    let mut symbol_resolver = SymbolResolver::new();
    if let Some(symbol_path) = &cli.symbols {
        info!("Loading symbols from: {}", symbol_path.display());
        symbol_resolver
            .load_symbols(symbol_path)
            .with_context(|| format!("failed to load symbols from {}", symbol_path.display()))?;
    }

    let mapped: &[u8] = &memory_map.mapped;
    let kernel_version = symbol_resolver.detect_kernel_version(mapped);
    match &kernel_version {
        Some(version) => info!("Detected kernel version in memory dump: {}", version),
        None => warn!("Could not detect kernel version from memory dump; using default offsets"),
    }

    let init_task_offset = symbol_resolver
        .find_init_task(mapped, &translator, kernel_version.as_ref())
        .ok_or_else(|| AnalysisError::SymbolNotFound("init_task".to_string()))?;
    info!("Found init_task at file offset: 0x{:x}", init_task_offset);

    let context = AnalysisContext {
        mapped,
        translator: &translator,
        symbol_resolver: &symbol_resolver,
        kernel_version: kernel_version.as_ref(),
        init_task_offset,
    };

    let output_format = match cli.format {
        OutputFormatArg::Text => OutputFormat::Text,
        OutputFormatArg::Csv => OutputFormat::Csv,
        OutputFormatArg::Json => OutputFormat::Json,
        OutputFormatArg::Jsonl => OutputFormat::Jsonl,
    };
    let output_dest = match &cli.output {
        Some(path) => OutputDestination::File(path.clone()),
        None => OutputDestination::Stdout,
    };
    let output_writer = OutputWriter::new(output_format, output_dest);

    let plugin = LsofPlugin {
        filter: ProcessFilter::new(cli.pid, cli.name.as_deref())?,
        max_path_depth: cli.max_path_depth,
        show_progress: cli.verbose || cli.debug,
    };
    let PluginOutput::OpenFiles(rows, diagnostics) = plugin.run(&context)?;

    if rows.is_empty() {
        warn!("No open files found matching the specified criteria");
    }
    output_writer.write_open_files(&rows)?;

    if diagnostics.skipped() > 0 || diagnostics.missing_tables > 0 {
        info!("Scan diagnostics: {}", diagnostics);
    }
    if cli.stats {
        eprintln!("{} rows; {}", rows.len(), diagnostics);
    }

    Ok(())
}

/// `--debug` and `--verbose` set the default level; `RUST_LOG` overrides it
fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
