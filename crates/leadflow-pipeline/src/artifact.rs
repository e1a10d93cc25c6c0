//! Tabular pipeline artifacts
//!
//! Every artifact the pipeline reads or writes is a CSV table with a
//! header row. The in-memory form keeps cells as strings; typed access
//! happens at the edges (ingest produces records, stages consume files).

use crate::error::Result;
use leadflow_common::types::FetchRecord;
use std::path::Path;

/// Column order for the raw comments artifact.
pub const RECORD_HEADERS: [&str; 6] = [
    "Timestamp",
    "Username",
    "VideoID",
    "Comment",
    "Date",
    "ParentID",
];

/// An in-memory CSV table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableArtifact {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableArtifact {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build the raw comments artifact from fetched records.
    pub fn from_records(records: &[FetchRecord]) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.timestamp.to_rfc3339(),
                    r.author.clone(),
                    r.video_id.clone(),
                    r.text.clone(),
                    r.last_modified.to_rfc3339(),
                    r.parent_id.clone().unwrap_or_default(),
                ]
            })
            .collect();

        Self {
            headers: RECORD_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Data rows, excluding the header.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Count data rows of a CSV file without materializing it.
pub fn csv_row_count(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut count = 0;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}
