//! CSV output formatter for the lsof tool
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::lsof::OpenFileInfo;
use csv::Writer;

/// CSV formatter that outputs data in comma-separated values format
pub struct CsvFormatter;

impl OutputFormatter for CsvFormatter {
    fn format_open_files(&self, files: &[OpenFileInfo]) -> Result<String, AnalysisError> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record(["offset", "name", "pid", "fd", "mode", "path"])?;

        for file in files {
            wtr.write_record(&[
                format!("0x{:x}", file.offset),
                file.comm.clone(),
                file.pid.to_string(),
                file.fd.to_string(),
                file.mode.clone(),
                file.path.clone(),
            ])?;
        }

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::test_rows;

    #[test]
    fn test_csv_rows() {
        let out = CsvFormatter.format_open_files(&test_rows()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "offset,name,pid,fd,mode,path");
        assert_eq!(lines[1], "0x1c2d40,sshd,812,0,r--,/dev/null");
        assert_eq!(lines[2], "0x1c2d40,sshd,812,4,rw-,\"/tmp/a,b\"");
        assert_eq!(lines.len(), 4);
    }
}
