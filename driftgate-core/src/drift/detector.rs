//! Per-column drift detection between a base and a candidate dataset.

use tokio_util::sync::CancellationToken;

use super::encoding::encode_pair;
use super::ks::ks_2samp;
use crate::config::DriftConfig;
use crate::dataset::{CellValue, Dataset};
use crate::error::{GateError, Result};
use crate::report::{DriftFinding, DriftReport};

/// Runs a two-sample KS test on every base column and collects the findings.
///
/// Columns are tested on a small pool of scoped threads. Each worker owns a
/// disjoint slice of the output slots, so no locking is involved; the report
/// is assembled in base-column order after all workers have joined.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    threshold: f64,
    workers: usize,
    exact_max_cells: usize,
    cancel: Option<CancellationToken>,
}

impl DriftDetector {
    pub fn new(config: &DriftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            threshold: config.threshold,
            workers: config.effective_workers(),
            exact_max_cells: config.exact_max_cells,
            cancel: None,
        })
    }

    /// Detector with default settings and the given threshold.
    pub fn with_threshold(threshold: f64) -> Result<Self> {
        Self::new(&DriftConfig {
            threshold,
            ..DriftConfig::default()
        })
    }

    /// Stop early (with [`GateError::Cancelled`]) once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Compare every base column against the candidate.
    ///
    /// Returns `(no_drift, report)`: `no_drift` is `false` if any column
    /// drifted. The report holds exactly one finding per base column.
    pub fn detect(&self, base: &Dataset, candidate: &Dataset) -> Result<(bool, DriftReport)> {
        let columns = base.columns();
        let mut slots: Vec<Option<Result<DriftFinding>>> =
            (0..columns.len()).map(|_| None).collect();

        let workers = self.workers.clamp(1, columns.len().max(1));
        if workers == 1 {
            self.run_chunk(columns, &mut slots, base, candidate);
        } else {
            let chunk = columns.len().div_ceil(workers);
            std::thread::scope(|s| {
                for (names, out) in columns.chunks(chunk).zip(slots.chunks_mut(chunk)) {
                    s.spawn(move || self.run_chunk(names, out, base, candidate));
                }
            });
        }

        if self.is_cancelled() {
            tracing::info!("Drift detection cancelled; discarding partial report");
            return Err(GateError::Cancelled);
        }

        let mut report = DriftReport::new();
        for slot in slots {
            match slot {
                Some(Ok(finding)) => report.push(finding),
                Some(Err(e)) => return Err(e),
                None => return Err(GateError::Cancelled),
            }
        }

        let no_drift = !report.has_drift();
        let drifted: Vec<&str> = report.drifted_columns().collect();
        if no_drift {
            tracing::info!(columns = report.len(), "No drift detected");
        } else {
            tracing::warn!(
                columns = report.len(),
                drifted = drifted.len(),
                "Drift detected in: {}",
                drifted.join(", ")
            );
        }
        Ok((no_drift, report))
    }

    fn run_chunk(
        &self,
        names: &[String],
        out: &mut [Option<Result<DriftFinding>>],
        base: &Dataset,
        candidate: &Dataset,
    ) {
        for (name, slot) in names.iter().zip(out.iter_mut()) {
            if self.is_cancelled() {
                return;
            }
            *slot = Some(self.test_column(name, base, candidate));
        }
    }

    /// Test a single column. The column must exist in `base`. A column the
    /// candidate lacks, or one with no values left on either side once
    /// missing cells are dropped, yields a drifted finding rather than an error.
    pub fn test_column(
        &self,
        column: &str,
        base: &Dataset,
        candidate: &Dataset,
    ) -> Result<DriftFinding> {
        let base_cells: Vec<&CellValue> = base
            .column(column)
            .ok_or_else(|| GateError::statistical_test(column, "column not present in base"))?
            .collect();

        let Some(candidate_cells) = candidate.column(column) else {
            tracing::warn!(column = %column, "Column {column} is missing from the candidate dataset");
            let present = base_cells.iter().filter(|c| !c.is_missing()).count();
            return Ok(DriftFinding::absent(column, present));
        };
        let candidate_cells: Vec<&CellValue> = candidate_cells.collect();

        let samples = encode_pair(&base_cells, &candidate_cells);
        if samples.base.is_empty() || samples.candidate.is_empty() {
            tracing::warn!(
                column = %column,
                base_size = samples.base.len(),
                candidate_size = samples.candidate.len(),
                "Column {column} has no values left to test after dropping missing cells"
            );
            return Ok(DriftFinding::untestable(
                column,
                samples.base.len(),
                samples.candidate.len(),
                samples.encoding,
            ));
        }

        let outcome = ks_2samp(&samples.base, &samples.candidate, self.exact_max_cells);
        let finding = DriftFinding::from_outcome(
            column,
            outcome,
            self.threshold,
            samples.base.len(),
            samples.candidate.len(),
            samples.encoding,
        );

        tracing::debug!(
            column = %column,
            statistic = finding.statistic,
            p_value = finding.p_value,
            encoding = %finding.encoding,
            method = %finding.method,
            drift = finding.drift_detected,
            "KS test"
        );
        if finding.drift_detected {
            tracing::warn!(
                column = %column,
                p_value = finding.p_value,
                "Drift detected in column {column}"
            );
        }
        Ok(finding)
    }
}
