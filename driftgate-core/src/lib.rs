//! # driftgate-core — schema and drift validation for tabular training data
//!
//! Sits between ingestion and training. Given a schema contract and a
//! train/test pair, the [`ValidationGate`] checks both datasets for required
//! columns, tests every train column against its test counterpart with a
//! two-sample Kolmogorov-Smirnov test, persists a YAML drift report and the
//! datasets, and emits a [`ValidationArtifact`] carrying one pass/fail verdict.

pub mod config;
pub mod dataset;
pub mod drift;
pub mod error;
pub mod gate;
pub mod report;
pub mod schema;
pub mod validate;

// Re-exports
pub use config::{DriftConfig, GateConfig, OutputConfig, load_config, workspace_config_path};
pub use dataset::{CellValue, Dataset};
pub use drift::{DriftDetector, Encoding, KsMethod};
pub use error::{GateError, Result};
pub use gate::{GateOutcome, GateState, ValidationArtifact, ValidationGate};
pub use report::{DriftFinding, DriftReport, ReportWriter};
pub use schema::{ColumnConstraint, DataType, SchemaContract};
pub use validate::{ConstraintViolation, SchemaCheck, SchemaValidator, ViolationKind};
