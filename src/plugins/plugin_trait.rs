//! Plugin system trait for the lsof tool
use crate::core::offsets::KernelVersion;
use crate::error::AnalysisError;
use crate::lsof::{OpenFileInfo, ScanDiagnostics};
use crate::symbols::SymbolResolver;
use crate::translation::MemoryTranslator;

/// Analysis context that provides access to all necessary components
pub struct AnalysisContext<'a> {
    pub mapped: &'a [u8],
    pub translator: &'a MemoryTranslator,
    pub symbol_resolver: &'a SymbolResolver,
    pub kernel_version: Option<&'a KernelVersion>,
    pub init_task_offset: u64, // File offset of init_task
}

/// Output from plugins
#[derive(Debug)]
pub enum PluginOutput {
    /// Open file rows plus what the walk had to skip
    OpenFiles(Vec<OpenFileInfo>, ScanDiagnostics),
}

/// Trait that all forensic plugins must implement
pub trait ForensicPlugin: Send + Sync {
    /// Get the name of the plugin
    fn name(&self) -> &str;

    /// Get a description of what the plugin does
    fn description(&self) -> &str;

    /// Run the plugin with the provided analysis context
    fn run(&self, context: &AnalysisContext) -> Result<PluginOutput, AnalysisError>;
}
