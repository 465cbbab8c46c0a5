//! Schema validation of a dataset against a contract.

use serde::{Deserialize, Serialize};

use crate::dataset::{CellValue, Dataset};
use crate::schema::{ColumnConstraint, DataType, SchemaContract};

/// An advisory constraint violation. Violations are reported but never make a
/// dataset invalid on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub column: String,
    /// 0-based data row (header excluded).
    pub row_index: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    TypeMismatch { expected: DataType, found: String },
    UnexpectedNull,
    BelowMin { value: f64, min: f64 },
    AboveMax { value: f64, max: f64 },
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found '{found}'")
            }
            ViolationKind::UnexpectedNull => write!(f, "missing value in non-nullable column"),
            ViolationKind::BelowMin { value, min } => write!(f, "{value} is below min {min}"),
            ViolationKind::AboveMax { value, max } => write!(f, "{value} is above max {max}"),
        }
    }
}

/// Full outcome of checking one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCheck {
    /// Contract columns absent from the dataset, in contract order.
    pub missing_columns: Vec<String>,
    /// Dataset columns the contract does not mention. Tolerated.
    pub extra_columns: Vec<String>,
    pub violations: Vec<ConstraintViolation>,
}

impl SchemaCheck {
    /// Valid iff no contract column is missing.
    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// Checks datasets against a contract and reports what is wrong.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    /// Stop logging violations for a column after this many.
    max_logged_violations: usize,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self {
            max_logged_violations: 5,
        }
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff every contract column is present. One warning is logged per
    /// missing column.
    pub fn validate(&self, dataset: &Dataset, contract: &SchemaContract) -> bool {
        self.check(dataset, contract).is_valid()
    }

    /// Presence check plus advisory dtype / null / range checks.
    pub fn check(&self, dataset: &Dataset, contract: &SchemaContract) -> SchemaCheck {
        let mut result = SchemaCheck::default();

        for (name, constraint) in contract.columns() {
            let Some(cells) = dataset.column(name) else {
                tracing::warn!(column = %name, "Required column {name} is missing");
                result.missing_columns.push(name.clone());
                continue;
            };

            let found = check_column(name, constraint, cells);
            for v in found.iter().take(self.max_logged_violations) {
                tracing::warn!(
                    column = %v.column,
                    row = v.row_index,
                    "Constraint violation: {}",
                    v.kind
                );
            }
            if found.len() > self.max_logged_violations {
                tracing::warn!(
                    column = %name,
                    suppressed = found.len() - self.max_logged_violations,
                    "Further constraint violations suppressed"
                );
            }
            result.violations.extend(found);
        }

        result.extra_columns = dataset
            .columns()
            .iter()
            .filter(|c| !contract.contains(c))
            .cloned()
            .collect();
        if !result.extra_columns.is_empty() {
            tracing::debug!(extra = ?result.extra_columns, "Columns not covered by contract");
        }

        result
    }
}

fn check_column<'a>(
    name: &str,
    constraint: &ColumnConstraint,
    cells: impl Iterator<Item = &'a CellValue>,
) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    let mut push = |row_index: usize, kind: ViolationKind| {
        out.push(ConstraintViolation {
            column: name.to_string(),
            row_index,
            kind,
        })
    };

    for (row, cell) in cells.enumerate() {
        match cell {
            CellValue::Missing => {
                if !constraint.nullable {
                    push(row, ViolationKind::UnexpectedNull);
                }
            }
            CellValue::Number(n) => {
                if let Some(expected) = constraint.dtype
                    && !number_matches(expected, *n)
                {
                    push(
                        row,
                        ViolationKind::TypeMismatch {
                            expected,
                            found: cell.render(),
                        },
                    );
                    continue;
                }
                if let Some(min) = constraint.min
                    && *n < min
                {
                    push(row, ViolationKind::BelowMin { value: *n, min });
                }
                if let Some(max) = constraint.max
                    && *n > max
                {
                    push(row, ViolationKind::AboveMax { value: *n, max });
                }
            }
            CellValue::Text(s) => {
                if let Some(expected) = constraint.dtype
                    && !text_matches(expected, s)
                {
                    push(
                        row,
                        ViolationKind::TypeMismatch {
                            expected,
                            found: s.clone(),
                        },
                    );
                }
            }
        }
    }
    out
}

fn number_matches(expected: DataType, n: f64) -> bool {
    match expected {
        DataType::Integer => n.fract() == 0.0,
        DataType::Float | DataType::Number => true,
        // Numbers are valid text; 0/1 are accepted booleans.
        DataType::String => true,
        DataType::Boolean => n == 0.0 || n == 1.0,
    }
}

fn text_matches(expected: DataType, s: &str) -> bool {
    match expected {
        DataType::String => true,
        DataType::Boolean => matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no"
        ),
        DataType::Integer | DataType::Float | DataType::Number => false,
    }
}
