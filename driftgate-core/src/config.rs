//! Configuration system for driftgate.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/driftgate/config.toml` and/or `.driftgate/config.toml`
//! in the workspace directory. The resolved [`GateConfig`] is passed by value into
//! [`crate::gate::ValidationGate::new`]; nothing is read from global state during a run.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GateError, Result};

/// Top-level configuration for one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Schema contract (YAML).
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Train (base / reference) dataset produced by ingestion.
    #[serde(default = "default_train_path")]
    pub train_path: PathBuf,
    /// Test (candidate) dataset produced by ingestion.
    #[serde(default = "default_test_path")]
    pub test_path: PathBuf,
    /// Where validated outputs and the drift report are written.
    #[serde(default)]
    pub output: OutputConfig,
    /// Drift detection settings.
    #[serde(default)]
    pub drift: DriftConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            train_path: default_train_path(),
            test_path: default_test_path(),
            output: OutputConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("data_schema/schema.yaml")
}

fn default_train_path() -> PathBuf {
    PathBuf::from("artifacts/ingested/train.csv")
}

fn default_test_path() -> PathBuf {
    PathBuf::from("artifacts/ingested/test.csv")
}

impl GateConfig {
    /// Reject values the gate cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.drift.validate()
    }

    pub fn valid_train_path(&self) -> PathBuf {
        self.output.dir.join("valid").join("train.csv")
    }

    pub fn valid_test_path(&self) -> PathBuf {
        self.output.dir.join("valid").join("test.csv")
    }

    pub fn invalid_train_path(&self) -> PathBuf {
        self.output.dir.join("invalid").join("train.csv")
    }

    pub fn invalid_test_path(&self) -> PathBuf {
        self.output.dir.join("invalid").join("test.csv")
    }

    pub fn drift_report_path(&self) -> PathBuf {
        self.output.dir.join("drift_report").join("report.yaml")
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory for every file the gate writes.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Also write failing datasets under `invalid/` and report those paths in the artifact.
    #[serde(default)]
    pub route_invalid: bool,
    /// Persist the validation artifact as JSON at this path.
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            route_invalid: false,
            artifact_path: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("artifacts/data_validation")
}

/// Drift detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// p-values strictly below this are declared drift.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Worker threads for per-column tests (0 = available parallelism).
    #[serde(default)]
    pub workers: usize,
    /// Largest `n * m` for which the exact KS distribution is computed.
    #[serde(default = "default_exact_max_cells")]
    pub exact_max_cells: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            workers: 0,
            exact_max_cells: default_exact_max_cells(),
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(GateError::config(format!(
                "drift.threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Resolve `workers = 0` to the machine's available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn default_threshold() -> f64 {
    0.05
}

fn default_exact_max_cells() -> usize {
    1_000_000
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".driftgate").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DRIFTGATE_`)
/// 3. Workspace-local config (`.driftgate/config.toml`)
/// 4. User config (`~/.config/driftgate/config.toml`)
/// 5. Built-in defaults
pub fn load_config(workspace: Option<&Path>, overrides: Option<Figment>) -> Result<GateConfig> {
    let mut figment = Figment::from(Serialized::defaults(GateConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "driftgate", "driftgate") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DRIFTGATE_DRIFT__THRESHOLD, DRIFTGATE_OUTPUT__DIR, ...
    figment = figment.merge(Env::prefixed("DRIFTGATE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(overrides);
    }

    let config: GateConfig = figment
        .extract()
        .map_err(|e| GateError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
