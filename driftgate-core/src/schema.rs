//! Schema contract: the columns a dataset must carry.
//!
//! The contract file is YAML. Two shapes are accepted:
//!
//! ```yaml
//! # mapping form
//! having_IP_Address: required
//! URL_Length: int64
//! Result:
//!   dtype: integer
//!   nullable: false
//!   min: -1
//!   max: 1
//! ```
//!
//! ```yaml
//! # list form
//! columns:
//!   - having_IP_Address: int64
//!   - URL_Length: int64
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{GateError, Result};

/// Expected type of a column's non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Float,
    /// Integer or float.
    Number,
    String,
    Boolean,
}

impl DataType {
    /// Map a dtype name (`int64`, `float64`, `object`, ...) to a [`DataType`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "int64" | "integer" => Some(Self::Integer),
            "float" | "float32" | "float64" | "double" => Some(Self::Float),
            "number" | "numeric" => Some(Self::Number),
            "str" | "string" | "object" | "text" | "category" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Float => write!(f, "float"),
            DataType::Number => write!(f, "number"),
            DataType::String => write!(f, "string"),
            DataType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Constraint attached to one contract column. Presence is always required;
/// the remaining fields are advisory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DataType>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnConstraint {
    /// Presence only.
    pub fn required() -> Self {
        Self {
            dtype: None,
            nullable: true,
            min: None,
            max: None,
        }
    }

    pub fn typed(dtype: DataType) -> Self {
        Self {
            dtype: Some(dtype),
            ..Self::required()
        }
    }
}

/// A constraint as written in the file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawConstraint {
    Marker(String),
    Detailed(DetailedConstraint),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetailedConstraint {
    #[serde(default)]
    dtype: Option<String>,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl RawConstraint {
    fn into_constraint(self, column: &str) -> std::result::Result<ColumnConstraint, String> {
        match self {
            RawConstraint::Marker(marker) => {
                let marker = marker.trim();
                if marker.eq_ignore_ascii_case("required") || marker.eq_ignore_ascii_case("any") {
                    return Ok(ColumnConstraint::required());
                }
                DataType::from_name(marker)
                    .map(ColumnConstraint::typed)
                    .ok_or_else(|| format!("unknown constraint '{marker}' for column '{column}'"))
            }
            RawConstraint::Detailed(detailed) => {
                let dtype = match detailed.dtype.as_deref() {
                    None => None,
                    Some(name) => Some(DataType::from_name(name).ok_or_else(|| {
                        format!("unknown dtype '{name}' for column '{column}'")
                    })?),
                };
                if let (Some(min), Some(max)) = (detailed.min, detailed.max)
                    && min > max
                {
                    return Err(format!(
                        "column '{column}' has min {min} greater than max {max}"
                    ));
                }
                Ok(ColumnConstraint {
                    dtype,
                    nullable: detailed.nullable,
                    min: detailed.min,
                    max: detailed.max,
                })
            }
        }
    }
}

/// Immutable, ordered set of expected columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaContract {
    columns: Vec<(String, ColumnConstraint)>,
}

impl SchemaContract {
    /// Build a contract from (name, constraint) pairs. Fails on a repeated name.
    pub fn new(
        columns: impl IntoIterator<Item = (String, ColumnConstraint)>,
    ) -> std::result::Result<Self, String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (name, constraint) in columns {
            if !seen.insert(name.clone()) {
                return Err(format!("duplicate column '{name}' in contract"));
            }
            out.push((name, constraint));
        }
        Ok(Self { columns: out })
    }

    /// Presence-only contract over the given names.
    pub fn required<I, S>(names: I) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|n| (n.into(), ColumnConstraint::required())),
        )
    }

    /// Parse contract YAML. `origin` is only used for error context.
    pub fn parse(yaml: &str, origin: &Path) -> Result<Self> {
        let root: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| GateError::schema_load(origin, e))?;

        let entries = flatten_entries(root).map_err(|e| GateError::schema_load(origin, e))?;

        let mut columns = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let name = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => {
                    return Err(GateError::schema_load(
                        origin,
                        format!("column names must be strings, got {other:?}"),
                    ));
                }
            };
            let constraint = if value.is_null() {
                ColumnConstraint::required()
            } else {
                let raw: RawConstraint = serde_yaml::from_value(value)
                    .map_err(|e| GateError::schema_load(origin, format!("column '{name}': {e}")))?;
                raw.into_constraint(&name)
                    .map_err(|e| GateError::schema_load(origin, e))?
            };
            columns.push((name, constraint));
        }

        Self::new(columns).map_err(|e| GateError::schema_load(origin, e))
    }

    /// Read and parse a contract file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| GateError::schema_load(path, e))?;
        Self::parse(&yaml, path)
    }

    /// Async variant of [`SchemaContract::load`].
    pub async fn load_async(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GateError::schema_load(path, e))?;
        Self::parse(&yaml, path)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> &[(String, ColumnConstraint)] {
        &self.columns
    }

    pub fn constraint(&self, column: &str) -> Option<&ColumnConstraint> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, c)| c)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.constraint(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Turn either file shape into ordered (key, value) pairs.
fn flatten_entries(
    root: serde_yaml::Value,
) -> std::result::Result<Vec<(serde_yaml::Value, serde_yaml::Value)>, String> {
    let mapping = match root {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(Vec::new()),
        other => return Err(format!("expected a mapping at top level, got {other:?}")),
    };

    // List form: a `columns` key holding a sequence of one-entry mappings or
    // bare names. Sibling lists (`numerical_columns`, ...) only describe
    // subsets of it and are skipped.
    if let Some(serde_yaml::Value::Sequence(items)) = mapping.get("columns") {
        for (key, value) in &mapping {
            if key.as_str() == Some("columns") {
                continue;
            }
            if !value.is_sequence() {
                return Err(format!(
                    "a `columns` list cannot be mixed with column entries, found {key:?}"
                ));
            }
            tracing::debug!(key = ?key, "Ignoring auxiliary column list in schema file");
        }

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                serde_yaml::Value::Mapping(m) if m.len() == 1 => {
                    entries.extend(m.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                serde_yaml::Value::String(name) => {
                    entries.push((serde_yaml::Value::String(name.clone()), serde_yaml::Value::Null));
                }
                other => {
                    return Err(format!(
                        "entries under 'columns' must be `name: constraint` or a bare name, got {other:?}"
                    ));
                }
            }
        }
        return Ok(entries);
    }

    Ok(mapping.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Result<SchemaContract> {
        SchemaContract::parse(yaml, Path::new("schema.yaml"))
    }

    #[test]
    fn test_parse_mapping_form() {
        let contract = parse("a: required\nb: required\n").unwrap();
        assert_eq!(contract.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(contract.constraint("a"), Some(&ColumnConstraint::required()));
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let contract = parse("zeta: required\nalpha: required\nmid: required\n").unwrap();
        assert_eq!(
            contract.column_names().collect::<Vec<_>>(),
            vec!["zeta", "alpha", "mid"]
        );
    }

    #[test]
    fn test_parse_dtype_markers() {
        let contract = parse("x: int64\ny: float64\nz: object\n").unwrap();
        assert_eq!(contract.constraint("x").unwrap().dtype, Some(DataType::Integer));
        assert_eq!(contract.constraint("y").unwrap().dtype, Some(DataType::Float));
        assert_eq!(contract.constraint("z").unwrap().dtype, Some(DataType::String));
    }

    #[test]
    fn test_parse_detailed_constraint() {
        let yaml = "label:\n  dtype: integer\n  nullable: false\n  min: -1\n  max: 1\n";
        let contract = parse(yaml).unwrap();
        let c = contract.constraint("label").unwrap();
        assert_eq!(c.dtype, Some(DataType::Integer));
        assert!(!c.nullable);
        assert_eq!(c.min, Some(-1.0));
        assert_eq!(c.max, Some(1.0));
    }

    #[test]
    fn test_parse_null_value_means_required() {
        let contract = parse("a:\nb: required\n").unwrap();
        assert_eq!(contract.len(), 2);
        assert_eq!(contract.constraint("a"), Some(&ColumnConstraint::required()));
    }

    #[test]
    fn test_parse_list_form() {
        let yaml = "columns:\n  - having_IP_Address: int64\n  - URL_Length: int64\n  - Result\n";
        let contract = parse(yaml).unwrap();
        assert_eq!(
            contract.column_names().collect::<Vec<_>>(),
            vec!["having_IP_Address", "URL_Length", "Result"]
        );
    }

    #[test]
    fn test_parse_list_form_with_numerical_columns() {
        let yaml = "columns:\n  - a: int64\n  - b: int64\nnumerical_columns:\n  - a\n  - b\n";
        let contract = parse(yaml).unwrap();
        assert_eq!(contract.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            contract.constraint("a"),
            Some(&ColumnConstraint::typed(DataType::Integer))
        );
    }

    #[test]
    fn test_parse_list_form_order_of_keys_does_not_matter() {
        let yaml = "numerical_columns:\n  - b\ncolumns:\n  - a\n  - b\n";
        let contract = parse(yaml).unwrap();
        assert_eq!(contract.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_list_mixed_with_mapping_entries() {
        let err = parse("columns:\n  - a\nb: required\n").unwrap_err();
        assert!(matches!(err, GateError::SchemaLoad { .. }));
    }

    #[test]
    fn test_parse_empty_file_is_empty_contract() {
        let contract = parse("").unwrap();
        assert!(contract.is_empty());
    }

    #[test]
    fn test_parse_rejects_duplicate_list_entries() {
        let yaml = "columns:\n  - a: required\n  - a: int64\n";
        let err = parse(yaml).unwrap_err();
        assert!(matches!(err, GateError::SchemaLoad { .. }));
        assert!(err.to_string().contains("duplicate column 'a'"));
    }

    #[test]
    fn test_parse_rejects_duplicate_mapping_keys() {
        assert!(matches!(
            parse("a: required\na: required\n"),
            Err(GateError::SchemaLoad { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_marker() {
        let err = parse("a: sometimes\n").unwrap_err();
        assert!(err.to_string().contains("unknown constraint 'sometimes'"));
    }

    #[test]
    fn test_parse_rejects_inverted_range() {
        let err = parse("a:\n  min: 5\n  max: 1\n").unwrap_err();
        assert!(err.to_string().contains("greater than max"));
    }

    #[test]
    fn test_parse_rejects_scalar_root() {
        assert!(parse("just a string").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SchemaContract::load(Path::new("/nonexistent/schema.yaml")).unwrap_err();
        assert_eq!(err.path(), Some(Path::new("/nonexistent/schema.yaml")));
    }

    #[test]
    fn test_required_builder_rejects_duplicates() {
        assert!(SchemaContract::required(["a", "b"]).is_ok());
        assert!(SchemaContract::required(["a", "a"]).is_err());
    }

    #[test]
    fn test_dtype_from_name() {
        assert_eq!(DataType::from_name("INT64"), Some(DataType::Integer));
        assert_eq!(DataType::from_name("bool"), Some(DataType::Boolean));
        assert_eq!(DataType::from_name("numeric"), Some(DataType::Number));
        assert_eq!(DataType::from_name("tensor"), None);
    }
}
