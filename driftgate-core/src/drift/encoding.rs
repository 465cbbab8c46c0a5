//! Turning a column's cells into numeric samples for the KS test.
//!
//! Numeric columns are used as-is. Any column with at least one non-numeric
//! cell (in either dataset) is ordinal-encoded: every non-missing cell is
//! rendered as text and replaced by the rank of that text among the sorted
//! union of distinct texts from both datasets. Missing cells are dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dataset::CellValue;

/// Encoding applied to a column before testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Numeric,
    Ordinal,
    /// Column missing from the candidate; nothing was encoded.
    Absent,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Numeric => write!(f, "numeric"),
            Encoding::Ordinal => write!(f, "ordinal"),
            Encoding::Absent => write!(f, "absent"),
        }
    }
}

/// Both samples of one column under a shared encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSamples {
    pub base: Vec<f64>,
    pub candidate: Vec<f64>,
    pub encoding: Encoding,
}

/// Encode the two sides of a column consistently.
pub fn encode_pair(base: &[&CellValue], candidate: &[&CellValue]) -> ColumnSamples {
    let numeric = base
        .iter()
        .chain(candidate.iter())
        .all(|c| matches!(c, CellValue::Number(_) | CellValue::Missing));

    if numeric {
        return ColumnSamples {
            base: base.iter().filter_map(|c| c.as_f64()).collect(),
            candidate: candidate.iter().filter_map(|c| c.as_f64()).collect(),
            encoding: Encoding::Numeric,
        };
    }

    let mut ranks: BTreeMap<String, f64> = BTreeMap::new();
    for cell in base.iter().chain(candidate.iter()) {
        if !cell.is_missing() {
            ranks.entry(cell.render()).or_insert(0.0);
        }
    }
    for (rank, value) in ranks.values_mut().enumerate() {
        *value = rank as f64;
    }

    let encode = |cells: &[&CellValue]| -> Vec<f64> {
        cells
            .iter()
            .filter(|c| !c.is_missing())
            .filter_map(|c| ranks.get(&c.render()).copied())
            .collect()
    };

    ColumnSamples {
        base: encode(base),
        candidate: encode(candidate),
        encoding: Encoding::Ordinal,
    }
}
