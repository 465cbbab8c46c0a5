//! The validation gate: schema checks and drift detection for a train/test
//! pair, folded into one pass/fail decision.
//!
//! A run moves through `Init -> SchemaChecked -> DriftChecked -> Persisted -> Done`.
//! Any unrecoverable error moves it to `Failed` and is returned to the caller;
//! no artifact is produced in that case. Missing columns and drift are not
//! errors: they only flip `overall_status` to `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::dataset::Dataset;
use crate::drift::DriftDetector;
use crate::error::{GateError, Result};
use crate::report::{DriftReport, ReportWriter};
use crate::schema::SchemaContract;
use crate::validate::{SchemaCheck, SchemaValidator};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Init,
    SchemaChecked,
    DriftChecked,
    Persisted,
    Done,
    Failed,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Init => write!(f, "init"),
            GateState::SchemaChecked => write!(f, "schema_checked"),
            GateState::DriftChecked => write!(f, "drift_checked"),
            GateState::Persisted => write!(f, "persisted"),
            GateState::Done => write!(f, "done"),
            GateState::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal output of a run, handed to the training stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub run_id: Uuid,
    pub validated_at: DateTime<Utc>,
    /// `train_schema_valid && test_schema_valid && no_drift`.
    pub overall_status: bool,
    pub train_schema_valid: bool,
    pub test_schema_valid: bool,
    pub no_drift: bool,
    pub valid_train_path: PathBuf,
    pub valid_test_path: PathBuf,
    /// Only set when invalid routing is enabled and the train set failed.
    pub invalid_train_path: Option<PathBuf>,
    /// Only set when invalid routing is enabled and the test set failed.
    pub invalid_test_path: Option<PathBuf>,
    pub drift_report_path: PathBuf,
}

impl ValidationArtifact {
    pub fn aggregate_status(train_schema_valid: bool, test_schema_valid: bool, no_drift: bool) -> bool {
        train_schema_valid && test_schema_valid && no_drift
    }

    /// Persist as pretty JSON, creating parent directories.
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| GateError::artifact_write(path, e))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GateError::artifact_write(path, e))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| GateError::artifact_write(path, e))
    }

    /// Load an artifact persisted with [`ValidationArtifact::write_json`].
    pub fn read_json(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| GateError::artifact_read(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| GateError::artifact_read(path, e))
    }
}

/// Everything a run found, for callers that want more than the artifact.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub artifact: ValidationArtifact,
    pub train_schema: SchemaCheck,
    pub test_schema: SchemaCheck,
    pub drift_report: DriftReport,
}

/// Validates a train/test pair against a schema contract and each other.
pub struct ValidationGate {
    config: GateConfig,
    validator: SchemaValidator,
    cancellation: CancellationToken,
    state: GateState,
}

impl ValidationGate {
    pub fn new(config: GateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            validator: SchemaValidator::new(),
            cancellation: CancellationToken::new(),
            state: GateState::Init,
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Token that aborts the next or current run when cancelled.
    ///
    /// A cancelled token is spent: once a run observes it, the gate swaps in
    /// a fresh one, so tokens must be fetched again for later runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Run the gate and return the artifact.
    pub async fn run(&mut self) -> Result<ValidationArtifact> {
        self.run_detailed().await.map(|outcome| outcome.artifact)
    }

    /// Run the gate and return the artifact with the schema checks and drift report.
    pub async fn run_detailed(&mut self) -> Result<GateOutcome> {
        self.state = GateState::Init;
        let result = self.execute().await;
        if self.cancellation.is_cancelled() {
            self.cancellation = CancellationToken::new();
        }
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(state = %self.state, error = %e, "Validation gate failed");
                self.transition(GateState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: GateState) {
        tracing::info!(from = %self.state, to = %next, "Gate state transition");
        self.state = next;
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(GateError::Cancelled);
        }
        Ok(())
    }

    async fn execute(&mut self) -> Result<GateOutcome> {
        // Init -> SchemaChecked
        let contract = SchemaContract::load_async(&self.config.schema_path).await?;
        tracing::info!(
            path = %self.config.schema_path.display(),
            columns = contract.len(),
            "Loaded schema contract"
        );
        let train = Dataset::read_csv_async(&self.config.train_path).await?;
        let test = Dataset::read_csv_async(&self.config.test_path).await?;
        tracing::info!(
            train_rows = train.row_count(),
            test_rows = test.row_count(),
            "Loaded train and test datasets"
        );

        let train_schema = self.validator.check(&train, &contract);
        if !train_schema.is_valid() {
            tracing::warn!("Schema of train dataset is not correct");
        }
        let test_schema = self.validator.check(&test, &contract);
        if !test_schema.is_valid() {
            tracing::warn!("Schema of test dataset is not correct");
        }
        self.transition(GateState::SchemaChecked);
        self.ensure_not_cancelled()?;

        // SchemaChecked -> DriftChecked
        let train = Arc::new(train);
        let test = Arc::new(test);
        let detector =
            DriftDetector::new(&self.config.drift)?.with_cancellation(self.cancellation.clone());
        let (base, candidate) = (Arc::clone(&train), Arc::clone(&test));
        let detection = tokio::task::spawn_blocking(move || detector.detect(&base, &candidate));
        let (no_drift, drift_report) = match detection.await {
            Ok(result) => result?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => return Err(GateError::Cancelled),
        };
        if !no_drift {
            tracing::warn!("Data drift was detected between train and test");
        }

        let drift_report_path = self.config.drift_report_path();
        ReportWriter::write_async(&drift_report, &drift_report_path).await?;
        tracing::info!(path = %drift_report_path.display(), "Wrote drift report");
        self.transition(GateState::DriftChecked);
        self.ensure_not_cancelled()?;

        // DriftChecked -> Persisted
        let valid_train_path = self.config.valid_train_path();
        let valid_test_path = self.config.valid_test_path();
        train.write_csv_async(&valid_train_path).await?;
        test.write_csv_async(&valid_test_path).await?;

        let mut invalid_train_path = None;
        let mut invalid_test_path = None;
        if self.config.output.route_invalid {
            if !train_schema.is_valid() {
                let path = self.config.invalid_train_path();
                train.write_csv_async(&path).await?;
                invalid_train_path = Some(path);
            }
            if !test_schema.is_valid() || !no_drift {
                let path = self.config.invalid_test_path();
                test.write_csv_async(&path).await?;
                invalid_test_path = Some(path);
            }
        } else {
            tracing::info!(
                "Invalid-path routing is disabled; datasets are written to the valid paths only"
            );
        }
        self.transition(GateState::Persisted);

        // Persisted -> Done
        let train_schema_valid = train_schema.is_valid();
        let test_schema_valid = test_schema.is_valid();
        let artifact = ValidationArtifact {
            run_id: Uuid::new_v4(),
            validated_at: Utc::now(),
            overall_status: ValidationArtifact::aggregate_status(
                train_schema_valid,
                test_schema_valid,
                no_drift,
            ),
            train_schema_valid,
            test_schema_valid,
            no_drift,
            valid_train_path,
            valid_test_path,
            invalid_train_path,
            invalid_test_path,
            drift_report_path,
        };
        if let Some(path) = &self.config.output.artifact_path {
            artifact.write_json(path).await?;
            tracing::info!(path = %path.display(), "Wrote validation artifact");
        }
        self.transition(GateState::Done);
        tracing::info!(
            run_id = %artifact.run_id,
            overall_status = artifact.overall_status,
            train_schema_valid,
            test_schema_valid,
            no_drift,
            "Data validation finished"
        );

        Ok(GateOutcome {
            artifact,
            train_schema,
            test_schema,
            drift_report,
        })
    }
}
