//! JSONL library-file reader.
//!
//! One external record per line, tagged by `type`:
//! ```json
//! {"type":"track","persistent_id":"0A1B2C3D4E5F6071","name":"Song","location":"file:///a.mp3"}
//! {"type":"playlist","persistent_id":"00000000000000AA","name":"Mix","track_ids":["0A1B2C3D4E5F6071"]}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::ExternalRecord;

/// Streaming iterator over the records of a JSONL source.
///
/// Blank lines are skipped. A line that fails to parse yields an error
/// carrying its 1-based line number; the iterator keeps going, so callers
/// decide whether that aborts the stream.
pub struct RecordReader<R> {
    lines: Lines<BufReader<R>>,
    line_num: usize,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            line_num: 0,
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<ExternalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_num += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| {
                Error::InvalidArgument(format!("line {}: {e}", self.line_num))
            }));
        }
    }
}

/// Open a JSONL file for streaming.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn read_records(path: &Path) -> Result<RecordReader<File>> {
    if !path.exists() {
        return Err(Error::InvalidArgument(format!(
            "file not found: {}",
            path.display()
        )));
    }
    Ok(RecordReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersistentId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_records_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"track","persistent_id":"0000000000000001","name":"A"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, r#"{{"type":"playlist","persistent_id":"0000000000000002","name":"P"}}"#).unwrap();

        let records: Vec<ExternalRecord> = read_records(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            ExternalRecord::Track(t) => assert_eq!(t.persistent_id, Some(PersistentId(1))),
            ExternalRecord::Playlist(_) => panic!("expected track"),
        }
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let input = "{\"type\":\"track\"}\n\nnot json\n";
        let results: Vec<Result<ExternalRecord>> = RecordReader::new(input.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err().to_string();
        assert!(err.contains("line 3"), "{err}");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_records(&dir.path().join("nope.jsonl")).is_err());
    }
}
