//! Tabular data
//!
//! [`DataTable`] is a named-column numeric table. Missing cells are held as
//! `NaN` in memory and written as empty fields in CSV files. CSV reading and
//! writing goes through polars.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use phishguard_databases::{Document, IDENTITY_FIELD};
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Upstream spelling of a missing value
pub const MISSING_SENTINEL: &str = "na";

/// A table of named `f64` columns
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(PipelineError::SchemaMismatch(format!(
                "{} column names for {} value columns",
                columns.len(),
                values.ncols()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = columns.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PipelineError::SchemaMismatch(format!(
                "duplicate column '{duplicate}'"
            )));
        }

        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|index| self.values.column(index))
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_nan()).count()
    }

    /// Rows at `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> DataTable {
        DataTable {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Values of `names`, in that order
    pub fn select_columns(&self, names: &[String]) -> Result<Array2<f64>> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    PipelineError::SchemaMismatch(format!("missing column '{name}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.values.select(Axis(1), &indices))
    }

    /// Split one column off, returning the remaining table and that column.
    pub fn split_column(&self, name: &str) -> Result<(DataTable, Array1<f64>)> {
        let index = self.column_index(name).ok_or_else(|| {
            PipelineError::SchemaMismatch(format!("missing column '{name}'"))
        })?;

        let keep: Vec<usize> = (0..self.n_cols()).filter(|&i| i != index).collect();
        let columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let remaining = DataTable {
            columns,
            values: self.values.select(Axis(1), &keep),
        };

        Ok((remaining, self.values.column(index).to_owned()))
    }

    /// Append a column
    pub fn with_column(mut self, name: &str, values: Array1<f64>) -> Result<Self> {
        if self.column_index(name).is_some() {
            return Err(PipelineError::SchemaMismatch(format!(
                "column '{name}' already exists"
            )));
        }
        if values.len() != self.n_rows() {
            return Err(PipelineError::SchemaMismatch(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.n_rows()
            )));
        }

        self.values
            .push_column(values.view())
            .map_err(|e| PipelineError::SchemaMismatch(e.to_string()))?;
        self.columns.push(name.to_string());
        Ok(self)
    }

    /// Build a table from flat documents.
    ///
    /// The identity field is dropped. Column order follows the first document.
    /// `"na"` strings and nulls become missing values, numeric strings are
    /// parsed and booleans map to 1/0.
    pub fn from_documents(documents: &[Document]) -> Result<Self> {
        let Some(first) = documents.first() else {
            return Err(PipelineError::EmptyDataset(
                "no documents to build a table from".to_string(),
            ));
        };

        let columns: Vec<String> = first
            .keys()
            .filter(|key| key.as_str() != IDENTITY_FIELD)
            .cloned()
            .collect();

        let mut values = Array2::from_elem((documents.len(), columns.len()), f64::NAN);
        for (row, document) in documents.iter().enumerate() {
            for (col, name) in columns.iter().enumerate() {
                if let Some(value) = document.get(name) {
                    values[[row, col]] = numeric_value(name, value)?;
                }
            }
        }

        Self::new(columns, values)
    }

    /// One document per row, missing cells as `"na"`
    pub fn to_documents(&self) -> Vec<Document> {
        self.values
            .outer_iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(name, &value)| {
                        let value = if value.is_nan() {
                            Value::from(MISSING_SENTINEL)
                        } else if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                            Value::from(value as i64)
                        } else {
                            Value::from(value)
                        };
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Read a CSV file with a header row
    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingArtifact(path.to_path_buf()));
        }

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::serialization(path, e))?;

        let table = Self::from_frame(&frame)?;
        debug!(
            "Read {} rows x {} columns from {}",
            table.n_rows(),
            table.n_cols(),
            path.display()
        );
        Ok(table)
    }

    /// Parse CSV content held in memory
    pub fn read_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| PipelineError::MalformedRecord {
                column: "<upload>".to_string(),
                reason: e.to_string(),
            })?;

        Self::from_frame(&frame)
    }

    /// Write as CSV with a header row, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let mut frame = self
            .to_frame()
            .map_err(|e| PipelineError::serialization(path, e))?;
        let mut file = fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)
            .map_err(|e| PipelineError::serialization(path, e))?;

        debug!("Wrote {} rows to {}", self.n_rows(), path.display());
        Ok(())
    }

    /// Text cells must be empty, the missing sentinel, or a number.
    fn from_frame(frame: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut values = Array2::from_elem((frame.height(), columns.len()), f64::NAN);
        for (col, series) in frame.get_columns().iter().enumerate() {
            let name = &columns[col];
            let malformed = |e: PolarsError| PipelineError::MalformedRecord {
                column: name.clone(),
                reason: e.to_string(),
            };

            if series.dtype() == &DataType::String {
                for (row, cell) in series.str().map_err(malformed)?.into_iter().enumerate() {
                    if let Some(text) = cell {
                        values[[row, col]] = parse_text(name, text)?;
                    }
                }
            } else {
                let numeric = series.cast(&DataType::Float64).map_err(malformed)?;
                for (row, value) in numeric.f64().map_err(malformed)?.into_iter().enumerate() {
                    if let Some(value) = value {
                        values[[row, col]] = value;
                    }
                }
            }
        }

        Self::new(columns, values)
    }

    fn to_frame(&self) -> PolarsResult<DataFrame> {
        let series = self
            .columns
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let cells: Vec<Option<f64>> = self
                    .values
                    .column(col)
                    .iter()
                    .map(|&value| (!value.is_nan()).then_some(value))
                    .collect();
                Series::new(name, cells)
            })
            .collect::<Vec<_>>();

        DataFrame::new(series)
    }
}

/// Empty text and the missing sentinel (any case) are missing
fn parse_text(column: &str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case(MISSING_SENTINEL) {
        return Ok(f64::NAN);
    }
    text.parse::<f64>().map_err(|_| PipelineError::MalformedRecord {
        column: column.to_string(),
        reason: format!("'{text}' is not numeric"),
    })
}

fn numeric_value(column: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64().ok_or_else(|| PipelineError::MalformedRecord {
            column: column.to_string(),
            reason: format!("number {number} is not representable as f64"),
        }),
        Value::String(text) => parse_text(column, text),
        other => Err(PipelineError::MalformedRecord {
            column: column.to_string(),
            reason: format!("unsupported value {other}"),
        }),
    }
}
