//! Record persistence
//!
//! This module handles:
//! - Choosing a writer for the configured format (CSV, JSON, SQLite)
//! - Naming output files, optionally with a timestamp suffix
//! - Refusing to write empty result sets

mod csv_writer;
mod json_writer;
mod sqlite_writer;

pub use csv_writer::CsvWriter;
pub use json_writer::JsonWriter;
pub use sqlite_writer::{SqliteWriter, RECORDS_SCHEMA_SQL};

use crate::config::{OutputConfig, OutputFormat};
use crate::record::Record;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix format appended to file names when timestamps are enabled
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Serializes a batch of records to a file
pub trait RecordWriter {
    /// The format this writer produces
    fn format(&self) -> OutputFormat;

    /// Writes `records` to `path`, replacing any existing file
    fn write(&self, records: &[Record], path: &Path) -> OutputResult<()>;
}

/// Returns the writer for a format
pub fn writer_for(format: OutputFormat) -> Box<dyn RecordWriter> {
    match format {
        OutputFormat::Csv => Box::new(CsvWriter),
        OutputFormat::Json => Box::new(JsonWriter),
        OutputFormat::Sqlite => Box::new(SqliteWriter),
    }
}

/// Builds `<directory>/<name>[_YYYYmmdd_HHMMSS].<ext>`
///
/// `filename` overrides the configured base name; a trailing extension
/// matching the format is not doubled.
pub fn output_path(config: &OutputConfig, filename: Option<&str>, now: DateTime<Local>) -> PathBuf {
    let extension = config.format.extension();
    let base = filename.unwrap_or(&config.filename);
    let base = base
        .strip_suffix(&format!(".{}", extension))
        .unwrap_or(base);

    let name = if config.include_timestamp {
        format!("{}_{}.{}", base, now.format(FILE_TIMESTAMP_FORMAT), extension)
    } else {
        format!("{}.{}", base, extension)
    };

    config.directory.join(name)
}

/// Persists records according to the output configuration
///
/// # Returns
///
/// * `Ok(Some(path))` - The file that was written
/// * `Ok(None)` - Nothing was written because `records` is empty
/// * `Err(OutputError)` - The file could not be written
pub fn save_records(
    records: &[Record],
    config: &OutputConfig,
    filename: Option<&str>,
) -> OutputResult<Option<PathBuf>> {
    if records.is_empty() {
        tracing::warn!("No data to save");
        return Ok(None);
    }

    let path = output_path(config, filename, Local::now());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let writer = writer_for(config.format);
    writer.write(records, &path)?;

    tracing::info!(
        "Saved {} records as {} to {}",
        records.len(),
        writer.format(),
        path.display()
    );
    Ok(Some(path))
}
