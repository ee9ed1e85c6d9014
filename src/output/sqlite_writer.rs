//! SQLite output
//!
//! Records land in a single `records` table. Bookkeeping keys get their own
//! columns; the extracted fields are stored as a JSON object so targets with
//! different selector maps share one schema.

use crate::config::OutputFormat;
use crate::output::{OutputResult, RecordWriter};
use crate::record::{Record, TIMESTAMP_FORMAT};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema of the output database
pub const RECORDS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL,
    scraped_at TEXT,
    page_number INTEGER,
    error TEXT,
    data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_source_url ON records(source_url);
"#;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteWriter;

impl RecordWriter for SqliteWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Sqlite
    }

    fn write(&self, records: &[Record], path: &Path) -> OutputResult<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(RECORDS_SCHEMA_SQL)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (source_url, scraped_at, page_number, error, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let data = serde_json::to_string(record.fields())?;
                let scraped_at = record
                    .scraped_at()
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string());
                stmt.execute(params![
                    record.source_url(),
                    scraped_at,
                    record.page_number(),
                    record.error(),
                    data
                ])?;
            }
        }
        tx.commit()?;

        Ok(())
    }
}
