//! JSONL (JSON Lines) output formatter for the lsof tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::lsof::OpenFileInfo;

/// JSONL formatter that outputs data as JSON objects, one per line
pub struct JsonlFormatter;

impl OutputFormatter for JsonlFormatter {
    fn format_open_files(&self, files: &[OpenFileInfo]) -> Result<String, AnalysisError> {
        let mut output = String::new();

        for file in files {
            let line = serde_json::to_string(file)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }
}
