//! Column-level schema of a table, as seen by validation.
//!
//! The data-aware validator never runs filters to learn intermediate
//! schemas. It starts from [`TableSchema::from_frame`] on the uploaded
//! dataset and lets each filter kind project the schema forward according to
//! its declared effect.

use crate::utils::{distinct_sorted, is_numeric_dtype, missing_count, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Integer and floating dtypes are numeric, everything else is categorical.
    pub fn of(dtype: &DataType) -> Self {
        if is_numeric_dtype(dtype) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }
}

/// Projected description of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    /// Number of missing values.
    pub missing: usize,
    /// Sorted distinct non-missing values; empty for numeric columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl ColumnSchema {
    pub fn numeric(name: impl Into<String>, missing: usize) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
            missing,
            categories: Vec::new(),
        }
    }

    pub fn categorical(name: impl Into<String>, missing: usize, categories: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Categorical,
            missing,
            categories,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn has_missing(&self) -> bool {
        self.missing > 0
    }
}

/// Projected description of a whole table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub n_rows: usize,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(n_rows: usize, columns: Vec<ColumnSchema>) -> Self {
        Self { n_rows, columns }
    }

    /// Describe an actual frame.
    pub fn from_frame(df: &DataFrame) -> PolarsResult<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            let missing = missing_count(series)?;
            let schema = match ColumnKind::of(series.dtype()) {
                ColumnKind::Numeric => ColumnSchema::numeric(name, missing),
                ColumnKind::Categorical => {
                    let categories = distinct_sorted(&string_values(series)?);
                    ColumnSchema::categorical(name, missing, categories)
                }
            };
            columns.push(schema);
        }
        Ok(Self::new(df.height(), columns))
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.is_numeric())
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| !c.is_numeric())
    }

    pub fn numeric_names(&self) -> Vec<String> {
        self.numeric_columns().map(|c| c.name.clone()).collect()
    }

    pub fn categorical_names(&self) -> Vec<String> {
        self.categorical_columns().map(|c| c.name.clone()).collect()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}
