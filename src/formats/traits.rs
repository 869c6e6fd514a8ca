//! Output format traits for the lsof tool
use crate::error::AnalysisError;
use crate::lsof::OpenFileInfo;

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    fn format_open_files(&self, files: &[OpenFileInfo]) -> Result<String, AnalysisError>;
}

/// Enum for output format types
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Jsonl,
}

/// Enum for output destination
#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(std::path::PathBuf),
}

/// Output writer that combines format and destination
pub struct OutputWriter {
    formatter: Box<dyn OutputFormatter>,
    destination: OutputDestination,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, destination: OutputDestination) -> Self {
        let formatter: Box<dyn OutputFormatter> = match format {
            OutputFormat::Text => Box::new(crate::formats::text::TextFormatter),
            OutputFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            OutputFormat::Json => Box::new(crate::formats::json::JsonFormatter),
            OutputFormat::Jsonl => Box::new(crate::formats::jsonl::JsonlFormatter),
        };

        Self {
            formatter,
            destination,
        }
    }

    /// Write open file rows to the configured destination
    pub fn write_open_files(&self, files: &[OpenFileInfo]) -> Result<(), AnalysisError> {
        let content = self.formatter.format_open_files(files)?;

        match &self.destination {
            OutputDestination::Stdout if content.ends_with('\n') => print!("{}", content),
            OutputDestination::Stdout => println!("{}", content),
            OutputDestination::File(path) => std::fs::write(path, content)?,
        }

        Ok(())
    }
}
