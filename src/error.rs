//! Error types for the lsof analysis
use thiserror::Error;

/// Run-level failures. Anything here stops the current plugin.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Symbol error: {0}")]
    SymbolError(String),
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("Plugin error: {0}")]
    PluginError(String),
    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("CSV into_inner error: {0}")]
    CsvIntoInnerError(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
    #[error("UTF-8 conversion error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

/// A structure in the capture could not be read.
///
/// Always recovered locally: the affected slot or row is skipped and the walk goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("virtual address 0x{0:x} is not mapped in the capture")]
    Unmapped(u64),
    #[error("file offset 0x{0:x} is past the end of the capture")]
    OutOfBounds(u64),
}
