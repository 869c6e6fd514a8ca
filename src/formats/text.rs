//! Text (table) output formatter for the lsof tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::lsof::OpenFileInfo;
use prettytable::{Cell, Row, Table};

/// Text formatter that outputs data in a human-readable table format
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format_open_files(&self, files: &[OpenFileInfo]) -> Result<String, AnalysisError> {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(Row::new(vec![
            Cell::new("Offset").style_spec("c"),
            Cell::new("Name").style_spec("c"),
            Cell::new("Pid").style_spec("c"),
            Cell::new("FD").style_spec("c"),
            Cell::new("Mode").style_spec("c"),
            Cell::new("Path").style_spec("c"),
        ]));

        for file in files {
            table.add_row(Row::new(vec![
                Cell::new(&format!("0x{:x}", file.offset)),
                Cell::new(&file.comm),
                Cell::new(&file.pid.to_string()).style_spec("r"),
                Cell::new(&file.fd.to_string()).style_spec("r"),
                Cell::new(&file.mode),
                Cell::new(&file.path),
            ]));
        }

        Ok(table.to_string())
    }
}
