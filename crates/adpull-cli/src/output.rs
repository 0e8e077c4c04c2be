use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use adpull_core::NormalizedRecord;

use crate::error::CliError;

/// JSONL record sink: one record per line, flushed on finish.
pub struct JsonlWriter<W: Write> {
    writer: W,
    records_written: u64,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &NormalizedRecord) -> Result<(), CliError> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, CliError> {
        self.writer.flush()?;
        Ok(self.records_written)
    }
}

/// Writes the whole record stream to `path`, creating or truncating it.
pub fn write_records(path: &Path, records: &[NormalizedRecord]) -> Result<u64, CliError> {
    let file = File::create(path)?;
    let mut writer = JsonlWriter::new(BufWriter::new(file));
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish()
}
