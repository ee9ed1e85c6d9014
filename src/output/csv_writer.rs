//! CSV output
//!
//! One row per record. The header is the sorted union of every record's
//! keys; a record lacking a column leaves that cell empty. Lists are joined
//! with `"; "` and nulls become empty cells.

use crate::config::OutputFormat;
use crate::output::{OutputResult, RecordWriter};
use crate::record::Record;
use csv::WriterBuilder;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWriter;

impl RecordWriter for CsvWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn write(&self, records: &[Record], path: &Path) -> OutputResult<()> {
        let columns: BTreeSet<String> = records.iter().flat_map(|r| r.keys()).collect();

        let file = File::create(path)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        writer.write_record(&columns)?;
        for record in records {
            let cells = record.to_cells();
            let row: Vec<&str> = columns
                .iter()
                .map(|column| cells.get(column).map(String::as_str).unwrap_or(""))
                .collect();
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}
