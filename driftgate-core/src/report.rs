//! Drift findings, the per-run report, and its YAML writer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::drift::{Encoding, KsMethod, KsOutcome};
use crate::error::{GateError, Result};

/// Result of testing one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftFinding {
    /// Carried as the report key in the file, not inside the entry.
    #[serde(skip)]
    pub column_name: String,
    pub p_value: f64,
    /// `p_value < threshold`.
    #[serde(rename = "drift_status")]
    pub drift_detected: bool,
    pub statistic: f64,
    pub base_size: usize,
    pub candidate_size: usize,
    pub encoding: Encoding,
    pub method: KsMethod,
}

impl DriftFinding {
    /// Build a finding from a p-value. Drift iff `p_value < threshold`; a
    /// p-value equal to the threshold is not drift.
    pub fn from_p_value(column: impl Into<String>, p_value: f64, threshold: f64) -> Self {
        Self {
            column_name: column.into(),
            p_value,
            drift_detected: p_value < threshold,
            statistic: 0.0,
            base_size: 0,
            candidate_size: 0,
            encoding: Encoding::Numeric,
            method: KsMethod::Exact,
        }
    }

    pub(crate) fn from_outcome(
        column: impl Into<String>,
        outcome: KsOutcome,
        threshold: f64,
        base_size: usize,
        candidate_size: usize,
        encoding: Encoding,
    ) -> Self {
        Self {
            statistic: outcome.statistic,
            base_size,
            candidate_size,
            encoding,
            method: outcome.method,
            ..Self::from_p_value(column, outcome.p_value, threshold)
        }
    }

    /// One side has no values to test once missing cells are dropped.
    /// Always counted as drift.
    pub fn untestable(
        column: impl Into<String>,
        base_size: usize,
        candidate_size: usize,
        encoding: Encoding,
    ) -> Self {
        Self {
            column_name: column.into(),
            p_value: 0.0,
            drift_detected: true,
            statistic: 1.0,
            base_size,
            candidate_size,
            encoding,
            method: KsMethod::Skipped,
        }
    }

    /// The candidate has no such column. Always counted as drift.
    pub fn absent(column: impl Into<String>, base_size: usize) -> Self {
        Self {
            column_name: column.into(),
            p_value: 0.0,
            drift_detected: true,
            statistic: 1.0,
            base_size,
            candidate_size: 0,
            encoding: Encoding::Absent,
            method: KsMethod::Skipped,
        }
    }
}

/// One finding per base column, in base column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    findings: Vec<DriftFinding>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, finding: DriftFinding) {
        self.findings.push(finding);
    }

    pub fn findings(&self) -> &[DriftFinding] {
        &self.findings
    }

    pub fn get(&self, column: &str) -> Option<&DriftFinding> {
        self.findings.iter().find(|f| f.column_name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.findings.iter().map(|f| f.column_name.as_str())
    }

    pub fn drifted_columns(&self) -> impl Iterator<Item = &str> {
        self.findings
            .iter()
            .filter(|f| f.drift_detected)
            .map(|f| f.column_name.as_str())
    }

    pub fn has_drift(&self) -> bool {
        self.findings.iter().any(|f| f.drift_detected)
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Render as a YAML mapping keyed by column name.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        let mut mapping = serde_yaml::Mapping::with_capacity(self.findings.len());
        for finding in &self.findings {
            mapping.insert(
                serde_yaml::Value::String(finding.column_name.clone()),
                serde_yaml::to_value(finding)?,
            );
        }
        serde_yaml::to_string(&mapping)
    }

    /// Parse YAML produced by [`DriftReport::to_yaml`].
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(yaml)?;
        let mut report = Self::new();
        for (key, value) in mapping {
            let column = match key {
                serde_yaml::Value::String(s) => s,
                other => serde_yaml::to_string(&other)?.trim().to_string(),
            };
            let mut finding: DriftFinding = serde_yaml::from_value(value)?;
            finding.column_name = column;
            report.push(finding);
        }
        Ok(report)
    }
}

/// Writes drift reports to disk.
pub struct ReportWriter;

impl ReportWriter {
    /// Write `report` to `path` as YAML, creating parent directories and
    /// replacing any existing file.
    pub fn write(report: &DriftReport, path: &Path) -> Result<()> {
        let yaml = report
            .to_yaml()
            .map_err(|e| GateError::report_write(path, e))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| GateError::report_write(path, e))?;
        }
        std::fs::write(path, yaml).map_err(|e| GateError::report_write(path, e))
    }

    /// Async variant of [`ReportWriter::write`].
    pub async fn write_async(report: &DriftReport, path: &Path) -> Result<()> {
        let yaml = report
            .to_yaml()
            .map_err(|e| GateError::report_write(path, e))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GateError::report_write(path, e))?;
        }
        tokio::fs::write(path, yaml)
            .await
            .map_err(|e| GateError::report_write(path, e))
    }

    /// Load a report written by this writer.
    pub fn read(path: &Path) -> Result<DriftReport> {
        let yaml = std::fs::read_to_string(path).map_err(|e| GateError::report_read(path, e))?;
        DriftReport::from_yaml(&yaml).map_err(|e| GateError::report_read(path, e))
    }
}
