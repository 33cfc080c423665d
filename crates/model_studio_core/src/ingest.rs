//! crates/model_studio_core/src/ingest.rs
//!
//! The file ingestor: converts raw uploaded bytes in one of three declared
//! formats into a uniform row/column structure plus a bounded preview.

use crate::domain::{FileType, Row};
use serde_json::Value;

/// How many rows of a dataset are kept as its listing preview.
pub const PREVIEW_ROWS: usize = 5;

/// Errors produced while converting an upload into structured rows.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("File type not supported: {0}. Allowed: csv, json, txt")]
    UnsupportedType(String),
    #[error("Error processing file: {0}")]
    BadInput(String),
}

/// The result of parsing one uploaded file.
#[derive(Debug, Clone)]
pub struct ParsedUpload {
    pub rows: Vec<Row>,
    pub preview: Vec<Row>,
    pub column_count: usize,
    pub row_count: usize,
}

impl ParsedUpload {
    fn from_rows(rows: Vec<Row>, column_count: usize) -> Self {
        let preview = rows.iter().take(PREVIEW_ROWS).cloned().collect();
        let row_count = rows.len();
        Self {
            rows,
            preview,
            column_count,
            row_count,
        }
    }
}

impl FileType {
    /// Maps a declared file extension onto a supported type. Anything else is
    /// rejected here, before any parser runs.
    pub fn from_extension(extension: &str) -> Result<Self, IngestError> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileType::Csv),
            "json" => Ok(FileType::Json),
            "txt" => Ok(FileType::Txt),
            other => Err(IngestError::UnsupportedType(other.to_string())),
        }
    }
}

/// Parses raw uploaded bytes according to the declared file type.
///
/// The entire payload is materialized in memory; the HTTP layer bounds the
/// request body size before bytes ever reach this function.
pub fn parse(content: &[u8], file_type: FileType) -> Result<ParsedUpload, IngestError> {
    match file_type {
        FileType::Csv => parse_csv(content),
        FileType::Json => parse_json(content),
        FileType::Txt => parse_txt(content),
    }
}

/// CSV with a header row: each record becomes a map keyed by header names.
fn parse_csv(content: &[u8]) -> Result<ParsedUpload, IngestError> {
    let mut reader = csv::Reader::from_reader(content);
    let headers = reader
        .headers()
        .map_err(|e| IngestError::BadInput(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::BadInput(e.to_string()))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(ParsedUpload::from_rows(rows, headers.len()))
}

/// JSON: either an array of objects (one row per element) or a single object
/// (exactly one row).
fn parse_json(content: &[u8]) -> Result<ParsedUpload, IngestError> {
    let value: Value =
        serde_json::from_slice(content).map_err(|e| IngestError::BadInput(e.to_string()))?;

    match value {
        Value::Array(elements) => {
            let rows = elements
                .into_iter()
                .map(|element| match element {
                    Value::Object(row) => Ok(row),
                    other => Err(IngestError::BadInput(format!(
                        "expected an array of objects, found element: {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<Row>, _>>()?;
            let column_count = rows.first().map(|row| row.len()).unwrap_or(0);
            Ok(ParsedUpload::from_rows(rows, column_count))
        }
        Value::Object(row) => {
            let column_count = row.len();
            Ok(ParsedUpload::from_rows(vec![row], column_count))
        }
        other => Err(IngestError::BadInput(format!(
            "expected a JSON object or array of objects, found: {}",
            other
        ))),
    }
}

/// Plain text: every non-blank line becomes a single-field `{"text": line}` row.
fn parse_txt(content: &[u8]) -> Result<ParsedUpload, IngestError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| IngestError::BadInput(format!("file is not valid UTF-8: {}", e)))?;

    let rows: Vec<Row> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut row = Row::new();
            row.insert("text".to_string(), Value::String(line.to_string()));
            row
        })
        .collect();

    Ok(ParsedUpload::from_rows(rows, 1))
}
