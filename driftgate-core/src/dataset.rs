//! In-memory tabular dataset loaded from CSV.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GateError, Result};

/// Field values that load as [`CellValue::Missing`]. Matched after trimming,
/// case-sensitively. This is the usual dataframe NA set plus `na`.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "na", "nan", "null",
];

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Classify a raw CSV field.
    pub fn parse(field: &str) -> Self {
        let trimmed = field.trim();
        if MISSING_MARKERS.contains(&trimmed) {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text rendering used for CSV output and ordinal encoding.
    pub fn render(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Missing => String::new(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// Ordered columns and rows of cells. Every row is as wide as the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Build a dataset from a header and rows. Fails if a row width differs from
    /// the header or a column name repeats.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> std::result::Result<Self, String> {
        let mut seen = std::collections::HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(format!("duplicate column '{name}' in header"));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(format!(
                    "row {} has {} fields, header has {}",
                    i + 1,
                    row.len(),
                    columns.len()
                ));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a dataset column-wise. All columns must have the same length.
    pub fn from_columns<S, V>(columns: Vec<(S, Vec<V>)>) -> std::result::Result<Self, String>
    where
        S: Into<String>,
        V: Into<CellValue>,
    {
        let height = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut rows: Vec<Vec<CellValue>> = (0..height)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for (name, values) in columns {
            let name = name.into();
            if values.len() != height {
                return Err(format!(
                    "column '{name}' has {} values, expected {height}",
                    values.len()
                ));
            }
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value.into());
            }
            names.push(name);
        }
        Self::new(names, rows)
    }

    /// Parse CSV bytes (header row required). `origin` is only used for error context.
    pub fn parse_csv(bytes: &[u8], origin: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| GateError::dataset_read(origin, e))?;
        let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(GateError::dataset_read(origin, "missing header row"));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| GateError::dataset_read(origin, e))?;
            rows.push(record.iter().map(CellValue::parse).collect());
        }

        Self::new(columns, rows).map_err(|e| GateError::dataset_read(origin, e))
    }

    /// Read a CSV file fully into memory.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| GateError::dataset_read(path, e))?;
        Self::parse_csv(&bytes, path)
    }

    /// Async variant of [`Dataset::read_csv`].
    pub async fn read_csv_async(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GateError::dataset_read(path, e))?;
        Self::parse_csv(&bytes, path)
    }

    /// Render as CSV with a header row. Missing cells become empty fields.
    pub fn to_csv_bytes(&self) -> std::result::Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(CellValue::render))?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }

    /// Write as CSV, creating parent directories and replacing any existing file.
    pub async fn write_csv_async(&self, path: &Path) -> Result<()> {
        let bytes = self
            .to_csv_bytes()
            .map_err(|e| GateError::dataset_write(path, e))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GateError::dataset_write(path, e))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| GateError::dataset_write(path, e))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate the cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }
}
