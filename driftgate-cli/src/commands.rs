//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use driftgate_core::config::{GateConfig, load_config, workspace_config_path};
use driftgate_core::{
    Dataset, DriftDetector, DriftReport, ReportWriter, SchemaCheck, SchemaContract,
    SchemaValidator, ValidationGate,
};
use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Flags shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub workspace: PathBuf,
    pub config_file: Option<PathBuf>,
}

/// Whether the data passed the checks a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    fn from_passed(passed: bool) -> Self {
        if passed { Verdict::Pass } else { Verdict::Fail }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Verdict::Pass => ExitCode::SUCCESS,
            Verdict::Fail => ExitCode::from(1),
        }
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, options: &GlobalOptions) -> anyhow::Result<Verdict> {
    match command {
        Commands::Validate {
            train,
            test,
            schema,
            output_dir,
            threshold,
            route_invalid,
            artifact,
        } => {
            let mut figment = overrides(options)?;
            figment = set(figment, "train_path", train);
            figment = set(figment, "test_path", test);
            figment = set(figment, "schema_path", schema);
            figment = set(figment, "output.dir", output_dir);
            figment = set(figment, "drift.threshold", threshold);
            figment = set(figment, "output.artifact_path", artifact);
            if route_invalid {
                figment = set(figment, "output.route_invalid", Some(true));
            }
            let config = resolve_config(options, figment)?;
            handle_validate(config).await
        }
        Commands::Drift {
            base,
            candidate,
            threshold,
            report,
        } => {
            let figment = set(overrides(options)?, "drift.threshold", threshold);
            let config = resolve_config(options, figment)?;
            handle_drift(
                &config,
                &anchor(&options.workspace, base),
                &anchor(&options.workspace, candidate),
                report.map(|p| anchor(&options.workspace, p)),
            )
            .await
        }
        Commands::Schema { dataset, schema } => {
            let figment = set(overrides(options)?, "schema_path", schema);
            let config = resolve_config(options, figment)?;
            handle_schema(&config, &anchor(&options.workspace, dataset)).await
        }
        Commands::Report { path } => {
            let report = ReportWriter::read(&anchor(&options.workspace, path))?;
            print!("{}", format_findings(&report));
            Ok(Verdict::from_passed(!report.has_drift()))
        }
        Commands::Config { action } => handle_config(action, options).await,
    }
}

async fn handle_validate(config: GateConfig) -> anyhow::Result<Verdict> {
    let mut gate = ValidationGate::new(config)?;

    let token = gate.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling validation");
            token.cancel();
        }
    });
    let result = gate.run_detailed().await;
    ctrl_c.abort();
    let outcome = result?;

    println!("{}", format_schema_check("train", &outcome.train_schema));
    println!("{}", format_schema_check("test", &outcome.test_schema));
    print!("{}", format_findings(&outcome.drift_report));
    println!(
        "Overall: {}",
        if outcome.artifact.overall_status { "PASS" } else { "FAIL" }
    );
    println!("{}", serde_json::to_string_pretty(&outcome.artifact)?);

    Ok(Verdict::from_passed(outcome.artifact.overall_status))
}

async fn handle_drift(
    config: &GateConfig,
    base_path: &Path,
    candidate_path: &Path,
    report_path: Option<PathBuf>,
) -> anyhow::Result<Verdict> {
    let base = Dataset::read_csv_async(base_path).await?;
    let candidate = Dataset::read_csv_async(candidate_path).await?;
    let detector = DriftDetector::new(&config.drift)?;

    let (no_drift, report) =
        tokio::task::spawn_blocking(move || detector.detect(&base, &candidate)).await??;

    print!("{}", format_findings(&report));
    if let Some(path) = report_path {
        ReportWriter::write_async(&report, &path).await?;
        println!("Report written to {}", path.display());
    }
    Ok(Verdict::from_passed(no_drift))
}

async fn handle_schema(config: &GateConfig, dataset_path: &Path) -> anyhow::Result<Verdict> {
    let contract = SchemaContract::load_async(&config.schema_path).await?;
    let dataset = Dataset::read_csv_async(dataset_path).await?;
    let check = SchemaValidator::new().check(&dataset, &contract);

    let label = dataset_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dataset_path.display().to_string());
    println!("{}", format_schema_check(&label, &check));
    for violation in &check.violations {
        println!(
            "  {} row {}: {}",
            violation.column, violation.row_index, violation.kind
        );
    }
    Ok(Verdict::from_passed(check.is_valid()))
}

async fn handle_config(action: ConfigAction, options: &GlobalOptions) -> anyhow::Result<Verdict> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(&options.workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(Verdict::Pass);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&GateConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(Verdict::Pass)
        }
        ConfigAction::Show => {
            let config = load_config(Some(&options.workspace), Some(overrides(options)?))
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(Verdict::Pass)
        }
    }
}

/// Base override layer: the `--config` file, if any. It sits above the
/// environment layer; subcommand flags are merged on top of it.
fn overrides(options: &GlobalOptions) -> anyhow::Result<Figment> {
    let mut figment = Figment::new();
    if let Some(path) = &options.config_file {
        let path = anchor(&options.workspace, path.clone());
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        figment = figment.merge(Toml::file(path));
    }
    Ok(figment)
}

fn set<T: Serialize>(figment: Figment, key: &str, value: Option<T>) -> Figment {
    match value {
        Some(value) => figment.merge(Serialized::default(key, value)),
        None => figment,
    }
}

/// Load the layered config and anchor its relative paths at the workspace.
fn resolve_config(options: &GlobalOptions, overrides: Figment) -> anyhow::Result<GateConfig> {
    let mut config = load_config(Some(&options.workspace), Some(overrides))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let ws = &options.workspace;
    config.schema_path = anchor(ws, config.schema_path);
    config.train_path = anchor(ws, config.train_path);
    config.test_path = anchor(ws, config.test_path);
    config.output.dir = anchor(ws, config.output.dir);
    config.output.artifact_path = config.output.artifact_path.map(|p| anchor(ws, p));
    Ok(config)
}

fn anchor(workspace: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workspace.join(path)
    }
}

fn format_schema_check(label: &str, check: &SchemaCheck) -> String {
    let mut out = if check.is_valid() {
        format!("{label}: schema OK")
    } else {
        format!(
            "{label}: missing columns: {}",
            check.missing_columns.join(", ")
        )
    };
    if !check.violations.is_empty() {
        out.push_str(&format!(
            " ({} advisory constraint violations)",
            check.violations.len()
        ));
    }
    out
}

fn format_findings(report: &DriftReport) -> String {
    let width = report.columns().map(str::len).max().unwrap_or(0).max(6);
    let mut out = format!(
        "{:<width$}  {:>9}  {:>10}  {:<8}  {:<10}  {}\n",
        "column", "statistic", "p_value", "encoding", "method", "drift"
    );
    for f in report.findings() {
        out.push_str(&format!(
            "{:<width$}  {:>9.4}  {:>10.3e}  {:<8}  {:<10}  {}\n",
            f.column_name,
            f.statistic,
            f.p_value,
            f.encoding.to_string(),
            f.method.to_string(),
            if f.drift_detected { "yes" } else { "no" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn options(workspace: &Path) -> GlobalOptions {
        GlobalOptions {
            workspace: workspace.to_path_buf(),
            config_file: None,
        }
    }

    /// Lay out the default input locations inside `workspace`.
    fn write_inputs(workspace: &Path, schema: &str, train: &str, test: &str) {
        let schema_dir = workspace.join("data_schema");
        let ingested = workspace.join("artifacts").join("ingested");
        std::fs::create_dir_all(&schema_dir).unwrap();
        std::fs::create_dir_all(&ingested).unwrap();
        std::fs::write(schema_dir.join("schema.yaml"), schema).unwrap();
        std::fs::write(ingested.join("train.csv"), train).unwrap();
        std::fs::write(ingested.join("test.csv"), test).unwrap();
    }

    fn validate_command() -> Commands {
        Commands::Validate {
            train: None,
            test: None,
            schema: None,
            output_dir: None,
            threshold: None,
            route_invalid: false,
            artifact: None,
        }
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, &options(dir.path())).await.unwrap();

        let config_path = dir.path().join(".driftgate").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: GateConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.drift.threshold, 0.05);
        assert_eq!(parsed.schema_path, PathBuf::from("data_schema/schema.yaml"));
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(".driftgate").join("config.toml");

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, &options(dir.path())).await.unwrap();
        std::fs::write(&config_path, "[drift]\nthreshold = 0.2\n").unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, &options(dir.path())).await.unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[drift]\nthreshold = 0.2\n");
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();
        assert_eq!(verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_validate_passing_data() {
        let dir = TempDir::new().unwrap();
        let data = "a,b\n1,x\n2,y\n3,z\n";
        write_inputs(dir.path(), "a: required\nb: required\n", data, data);

        let verdict = handle_command(validate_command(), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(verdict, Verdict::Pass);
        let output = dir.path().join("artifacts").join("data_validation");
        assert!(output.join("valid").join("train.csv").exists());
        assert!(output.join("drift_report").join("report.yaml").exists());
    }

    #[tokio::test]
    async fn test_validate_missing_column_fails() {
        let dir = TempDir::new().unwrap();
        write_inputs(
            dir.path(),
            "a: required\nb: required\n",
            "a,b,c\n1,2,3\n2,3,4\n",
            "a,c\n1,3\n2,4\n",
        );

        let verdict = handle_command(validate_command(), &options(dir.path()))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_validate_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let data = "a\n1\n2\n3\n";
        write_inputs(dir.path(), "a: required\n", data, data);
        let artifact = dir.path().join("artifact.json");

        let command = Commands::Validate {
            train: None,
            test: None,
            schema: None,
            output_dir: Some(PathBuf::from("out")),
            threshold: Some(0.5),
            route_invalid: true,
            artifact: Some(artifact.clone()),
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();

        assert_eq!(verdict, Verdict::Pass);
        assert!(dir.path().join("out").join("valid").join("test.csv").exists());
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
        assert_eq!(json["overall_status"], serde_json::Value::Bool(true));
    }

    #[tokio::test]
    async fn test_validate_missing_input_is_error() {
        let dir = TempDir::new().unwrap();
        let result = handle_command(validate_command(), &options(dir.path())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_drift_command_writes_report() {
        let dir = TempDir::new().unwrap();
        let base: String = std::iter::once("x".to_string())
            .chain((0..10).map(|i| i.to_string()))
            .collect::<Vec<_>>()
            .join("\n");
        let candidate: String = std::iter::once("x".to_string())
            .chain((1000..1010).map(|i| i.to_string()))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(dir.path().join("base.csv"), base).unwrap();
        std::fs::write(dir.path().join("candidate.csv"), candidate).unwrap();

        let command = Commands::Drift {
            base: PathBuf::from("base.csv"),
            candidate: PathBuf::from("candidate.csv"),
            threshold: None,
            report: Some(PathBuf::from("drift.yaml")),
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();
        assert_eq!(verdict, Verdict::Fail);

        let report = ReportWriter::read(&dir.path().join("drift.yaml")).unwrap();
        assert!(report.get("x").unwrap().drift_detected);

        let command = Commands::Report {
            path: PathBuf::from("drift.yaml"),
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();
        assert_eq!(verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_schema_command() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("contract.yaml"), "a: int64\nb: required\n").unwrap();
        std::fs::write(dir.path().join("ok.csv"), "a,b\n1,2\n").unwrap();
        std::fs::write(dir.path().join("bad.csv"), "a\n1\n").unwrap();

        let command = Commands::Schema {
            dataset: PathBuf::from("ok.csv"),
            schema: Some(PathBuf::from("contract.yaml")),
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();
        assert_eq!(verdict, Verdict::Pass);

        let command = Commands::Schema {
            dataset: PathBuf::from("bad.csv"),
            schema: Some(PathBuf::from("contract.yaml")),
        };
        let verdict = handle_command(command, &options(dir.path())).await.unwrap();
        assert_eq!(verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_missing_config_file_is_error() {
        let dir = TempDir::new().unwrap();
        let opts = GlobalOptions {
            workspace: dir.path().to_path_buf(),
            config_file: Some(PathBuf::from("nope.toml")),
        };
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, &opts).await.is_err());
    }

    #[test]
    fn test_config_file_beats_workspace_config() {
        let dir = TempDir::new().unwrap();
        let ws_config = workspace_config_path(dir.path());
        std::fs::create_dir_all(ws_config.parent().unwrap()).unwrap();
        std::fs::write(&ws_config, "[drift]\nthreshold = 0.01\nworkers = 3\n").unwrap();
        std::fs::write(dir.path().join("extra.toml"), "[drift]\nthreshold = 0.3\n").unwrap();
        let opts = GlobalOptions {
            workspace: dir.path().to_path_buf(),
            config_file: Some(PathBuf::from("extra.toml")),
        };

        let config = resolve_config(&opts, overrides(&opts).unwrap()).unwrap();
        assert_eq!(config.drift.threshold, 0.3);
        // Keys the extra file leaves out still come from the workspace config.
        assert_eq!(config.drift.workers, 3);

        let flagged = set(overrides(&opts).unwrap(), "drift.threshold", Some(0.2));
        let config = resolve_config(&opts, flagged).unwrap();
        assert_eq!(config.drift.threshold, 0.2);
    }

    #[test]
    fn test_anchor() {
        let ws = Path::new("/ws");
        assert_eq!(anchor(ws, PathBuf::from("a/b.csv")), PathBuf::from("/ws/a/b.csv"));
        assert_eq!(anchor(ws, PathBuf::from("/abs.csv")), PathBuf::from("/abs.csv"));
    }

    #[test]
    fn test_format_schema_check() {
        let ok = SchemaCheck::default();
        assert_eq!(format_schema_check("train", &ok), "train: schema OK");

        let missing = SchemaCheck {
            missing_columns: vec!["b".into(), "d".into()],
            ..SchemaCheck::default()
        };
        assert_eq!(
            format_schema_check("test", &missing),
            "test: missing columns: b, d"
        );
    }

    #[test]
    fn test_format_findings_lists_every_column() {
        let base = Dataset::from_columns(vec![
            ("alpha", vec![1.0, 2.0, 3.0]),
            ("beta", vec![4.0, 5.0, 6.0]),
        ])
        .unwrap();
        let (_, report) = DriftDetector::with_threshold(0.05)
            .unwrap()
            .detect(&base, &base)
            .unwrap();
        let table = format_findings(&report);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("column"));
        assert!(lines[1].starts_with("alpha"));
        assert!(lines[2].starts_with("beta"));
        assert!(lines[2].ends_with("no"));
    }

    #[test]
    fn test_verdict_from_outcome() {
        assert_eq!(Verdict::from_passed(true), Verdict::Pass);
        assert_eq!(Verdict::from_passed(false), Verdict::Fail);
    }
}
