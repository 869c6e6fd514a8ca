//! JSON output formatter for the lsof tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::lsof::OpenFileInfo;

#[derive(serde::Serialize)]
struct OutputWrapper<'a, T> {
    plugin: &'a str,
    timestamp: String,
    count: usize,
    results: &'a [T],
}

/// JSON formatter that outputs data in JSON format with metadata
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_open_files(&self, files: &[OpenFileInfo]) -> Result<String, AnalysisError> {
        let wrapper = OutputWrapper {
            plugin: "lsof",
            timestamp: chrono::Utc::now().to_rfc3339(),
            count: files.len(),
            results: files,
        };

        let json = serde_json::to_string_pretty(&wrapper)?;
        Ok(json)
    }
}
