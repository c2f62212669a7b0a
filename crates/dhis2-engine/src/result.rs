//! The uniform tabular model every endpoint is normalized into.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Numeric,
    Date,
    Boolean,
}

impl ColumnType {
    /// Dates stay `Utf8`: DHIS2 periods (`2024Q1`, `2024W05`) are not calendar dates.
    pub fn arrow_type(self) -> DataType {
        match self {
            ColumnType::Numeric => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Text | ColumnType::Date => DataType::Utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            composite => Value::Text(composite.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual rendering; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
        }
    }

    /// Convert to the representation of `column_type`. Values that do not
    /// fit are rendered as text rather than dropped.
    pub fn coerce(self, column_type: ColumnType) -> Value {
        match (column_type, self) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Numeric, Value::Text(s)) => match parse_number(&s) {
                Some(n) => Value::Number(n),
                None => Value::Text(s),
            },
            (ColumnType::Boolean, Value::Text(s)) => match parse_bool(&s) {
                Some(b) => Value::Bool(b),
                None => Value::Text(s),
            },
            (ColumnType::Text | ColumnType::Date, v @ (Value::Number(_) | Value::Bool(_))) => {
                Value::Text(v.as_text().unwrap_or_default())
            }
            (_, v) => v,
        }
    }
}

pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub fn format_number(n: f64) -> String {
    if n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Ordered columns plus rows aligned with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl NormalizedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result, checking every row has one value per column.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> EngineResult<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EngineError::normalization(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Convert into an Arrow batch (text/date → Utf8, numeric → Float64).
    pub fn to_record_batch(&self) -> EngineResult<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.column_type.arrow_type(), c.nullable))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let cells = self.rows.iter().map(|row| &row[i]);
            let array: ArrayRef = match column.column_type {
                ColumnType::Numeric => {
                    let values: Vec<Option<f64>> = cells
                        .map(|v| match v {
                            Value::Number(n) => Some(*n),
                            other => other.as_text().as_deref().and_then(parse_number),
                        })
                        .collect();
                    Arc::new(Float64Array::from(values))
                }
                ColumnType::Boolean => {
                    let values: Vec<Option<bool>> = cells
                        .map(|v| match v {
                            Value::Bool(b) => Some(*b),
                            other => other.as_text().as_deref().and_then(parse_bool),
                        })
                        .collect();
                    Arc::new(BooleanArray::from(values))
                }
                ColumnType::Text | ColumnType::Date => {
                    let values: Vec<Option<String>> = cells.map(Value::as_text).collect();
                    Arc::new(StringArray::from(values))
                }
            };
            arrays.push(array);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        RecordBatch::try_new_with_options(schema, arrays, &options)
            .map_err(|e| EngineError::normalization(format!("arrow conversion failed: {}", e)))
    }
}
