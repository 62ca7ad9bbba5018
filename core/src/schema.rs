//! Dataset schema
//!
//! The schema file lists every expected column as a single-entry map of
//! name to dtype, plus the subset of numerical columns:
//!
//! ```yaml
//! columns:
//!   - having_IP_Address: int64
//!   - Result: int64
//! numerical_columns:
//!   - having_IP_Address
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::storage::read_yaml_file;
use crate::table::DataTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: String,
}

impl ColumnSpec {
    fn is_integral(&self) -> bool {
        self.dtype.starts_with("int")
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    numerical_columns: Vec<String>,
}

/// Expected dataset layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
    pub numerical_columns: Vec<String>,
}

impl TryFrom<RawSchema> for Schema {
    type Error = String;

    fn try_from(raw: RawSchema) -> std::result::Result<Self, Self::Error> {
        let columns = raw
            .columns
            .into_iter()
            .map(|entry| {
                let mut entries = entry.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((name, dtype)), None) => Ok(ColumnSpec { name, dtype }),
                    _ => Err("each schema column must be a single `name: dtype` entry".to_string()),
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Schema {
            columns,
            numerical_columns: raw.numerical_columns,
        })
    }
}

impl Schema {
    pub fn load(path: &Path) -> Result<Self> {
        read_yaml_file(path)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Structural problems of `table` against this schema; empty when it
    /// conforms.
    pub fn column_problems(&self, table: &DataTable) -> Vec<String> {
        let mut problems = Vec::new();

        if table.n_cols() != self.column_count() {
            problems.push(format!(
                "found {} columns, expected {}",
                table.n_cols(),
                self.column_count()
            ));
        }

        let missing: Vec<&str> = self
            .column_names()
            .filter(|name| table.column_index(name).is_none())
            .collect();
        if !missing.is_empty() {
            problems.push(format!("missing columns [{}]", missing.join(", ")));
        }

        let missing_numerical: Vec<&str> = self
            .numerical_columns
            .iter()
            .map(String::as_str)
            .filter(|name| table.column_index(name).is_none())
            .collect();
        if !missing_numerical.is_empty() {
            problems.push(format!(
                "missing numerical columns [{}]",
                missing_numerical.join(", ")
            ));
        }

        problems
    }

    /// Integer columns holding fractional values. These are reported, not
    /// rejected.
    pub fn dtype_warnings(&self, table: &DataTable) -> Vec<String> {
        self.columns
            .iter()
            .filter(|spec| spec.is_integral())
            .filter_map(|spec| {
                let column = table.column(&spec.name)?;
                let fractional = column
                    .iter()
                    .filter(|v| !v.is_nan() && v.fract() != 0.0)
                    .count();
                (fractional > 0).then(|| {
                    format!(
                        "column '{}' is declared {} but has {} fractional values",
                        spec.name, spec.dtype, fractional
                    )
                })
            })
            .collect()
    }

    /// Fail when the schema does not declare `target`
    pub fn require_column(&self, target: &str) -> Result<()> {
        if self.column_names().any(|name| name == target) {
            Ok(())
        } else {
            Err(PipelineError::SchemaMismatch(format!(
                "schema does not declare target column '{target}'"
            )))
        }
    }
}
