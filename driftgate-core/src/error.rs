//! Error types for driftgate.
//!
//! Only unrecoverable failures live here. A dataset that misses a required
//! column or a column that drifted is a normal validation outcome and is
//! reported through [`crate::validate::SchemaCheck`] and
//! [`crate::report::DriftReport`], never through [`GateError`].

use std::path::PathBuf;

/// Boxed underlying cause carried by the I/O-flavoured variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GateError>;

/// Top-level error type for a validation run.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Failed to load schema contract from {path}: {source}")]
    SchemaLoad {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read dataset {path}: {source}")]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to write dataset {path}: {source}")]
    DatasetWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Statistical test failed for column '{column}': {message}")]
    StatisticalTest { column: String, message: String },

    #[error("Failed to write drift report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read drift report {path}: {source}")]
    ReportRead {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to write validation artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read validation artifact {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Validation run was cancelled")]
    Cancelled,
}

impl GateError {
    pub fn schema_load(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::SchemaLoad {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn dataset_read(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::DatasetRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn dataset_write(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::DatasetWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn report_write(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ReportWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn report_read(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ReportRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn artifact_write(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ArtifactWrite {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn artifact_read(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ArtifactRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn statistical_test(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatisticalTest {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The file this error is about, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::SchemaLoad { path, .. }
            | Self::DatasetRead { path, .. }
            | Self::DatasetWrite { path, .. }
            | Self::ReportWrite { path, .. }
            | Self::ReportRead { path, .. }
            | Self::ArtifactWrite { path, .. }
            | Self::ArtifactRead { path, .. } => Some(path),
            Self::StatisticalTest { .. } | Self::Config { .. } | Self::Cancelled => None,
        }
    }
}
