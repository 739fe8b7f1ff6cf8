//! In-memory tabular dataset parsed from uploaded CSV bytes.

use std::collections::HashMap;
use std::fmt;

use csv::ReaderBuilder;
use serde::Serialize;

use crate::table::{render_series, TextTable};
use crate::types::{AppError, AppResult};

const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int64 => write!(f, "int64"),
            DType::Float64 => write!(f, "float64"),
            DType::Bool => write!(f, "bool"),
            DType::Object => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Label used for grouping and chart categories.
    pub fn label(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Text(s) => s.clone(),
            Value::Missing => "NaN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Value>,
}

impl Column {
    fn infer(name: String, raw: Vec<String>) -> Self {
        let present: Vec<&str> = raw
            .iter()
            .map(String::as_str)
            .filter(|v| !is_na(v))
            .collect();
        let has_missing = present.len() != raw.len();

        let dtype = if present.is_empty() {
            DType::Float64
        } else if present.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
            if has_missing {
                DType::Float64
            } else {
                DType::Int64
            }
        } else if present.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
            DType::Float64
        } else if !has_missing && present.iter().all(|v| parse_bool(v).is_some()) {
            DType::Bool
        } else {
            DType::Object
        };

        let values = raw
            .into_iter()
            .map(|v| {
                if is_na(&v) {
                    return Value::Missing;
                }
                match dtype {
                    DType::Int64 => v.trim().parse().map(Value::Int).unwrap_or(Value::Missing),
                    DType::Float64 => v.trim().parse().map(Value::Float).unwrap_or(Value::Missing),
                    DType::Bool => parse_bool(&v).map(Value::Bool).unwrap_or(Value::Missing),
                    DType::Object => Value::Text(v),
                }
            })
            .collect();

        Self { name, dtype, values }
    }

    /// Non-missing numeric values in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    pub fn non_missing(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_missing())
    }

    /// Counts of each distinct non-missing value, most frequent first. Ties
    /// keep first-appearance order.
    pub fn value_counts(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in self.non_missing() {
            let label = value.label();
            let entry = counts.entry(label.clone()).or_insert_with(|| {
                order.push(label);
                0
            });
            *entry += 1;
        }
        let mut result: Vec<(String, usize)> = order
            .into_iter()
            .map(|label| {
                let count = counts[&label];
                (label, count)
            })
            .collect();
        // stable sort keeps first-appearance order among equal counts
        result.sort_by(|a, b| b.1.cmp(&a.1));
        result
    }

    /// Cell strings as rendered in text tables. Float columns share a
    /// common number of decimals.
    fn rendered_cells(&self) -> Vec<String> {
        match self.dtype {
            DType::Float64 => {
                let decimals = self
                    .values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(decimals_needed)
                    .max()
                    .unwrap_or(1)
                    .max(1);
                self.values
                    .iter()
                    .map(|v| match v.as_f64() {
                        Some(f) => format!("{:.*}", decimals, f),
                        None => "NaN".to_string(),
                    })
                    .collect()
            }
            _ => self.values.iter().map(Value::label).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Parse CSV bytes with a header row.
    pub fn from_csv_bytes(bytes: &[u8]) -> AppResult<Self> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(AppError::InvalidInput(
                "No columns to parse from file".to_string(),
            ));
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = dedupe_headers(rdr.headers()?.iter().map(|h| h.trim().to_string()).collect());
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::InvalidInput(
                "No columns to parse from file".to_string(),
            ));
        }

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut row_count = 0;
        for record in rdr.records() {
            let record = record?;
            if record.len() > headers.len() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(AppError::InvalidInput(format!(
                    "Error tokenizing data: expected {} fields in line {}, saw {}",
                    headers.len(),
                    line,
                    record.len()
                )));
            }
            // short rows are padded with missing cells
            for (idx, column) in raw.iter_mut().enumerate() {
                column.push(record.get(idx).unwrap_or_default().to_string());
            }
            row_count += 1;
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, values)| Column::infer(name, values))
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn dtypes(&self) -> Vec<(String, DType)> {
        self.columns.iter().map(|c| (c.name.clone(), c.dtype)).collect()
    }

    /// The first `n` rows as a new dataset with the same dtypes.
    pub fn head(&self, n: usize) -> Dataset {
        let take = n.min(self.row_count);
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    dtype: c.dtype,
                    values: c.values[..take].to_vec(),
                })
                .collect(),
            row_count: take,
        }
    }

    /// Render as a text table; `index` adds the 0-based row labels.
    pub fn to_text(&self, index: bool) -> String {
        let mut table = TextTable::new(self.column_names());
        let cells: Vec<Vec<String>> = self.columns.iter().map(Column::rendered_cells).collect();
        for r in 0..self.row_count {
            table.push_row(cells.iter().map(|col| col[r].clone()).collect());
        }
        if index {
            table = table.with_index((0..self.row_count).map(|i| i.to_string()).collect());
        }
        table.render()
    }

    /// Column name / dtype listing, one per line.
    pub fn dtypes_text(&self) -> String {
        let pairs: Vec<(String, String)> = self
            .dtypes()
            .into_iter()
            .map(|(name, dtype)| (name, dtype.to_string()))
            .collect();
        render_series(&pairs)
    }

    pub fn preview(&self, rows: usize, index: bool) -> DatasetPreview {
        let head = self.head(rows);
        DatasetPreview {
            columns: self
                .columns
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    dtype: c.dtype,
                })
                .collect(),
            row_count: self.row_count,
            rows: (0..head.row_count)
                .map(|r| head.columns.iter().map(|c| c.values[r].clone()).collect())
                .collect(),
            text: head.to_text(index),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: DType,
}

/// What the rendering layer shows after an upload.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPreview {
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub rows: Vec<Vec<Value>>,
    pub text: String,
}

fn is_na(value: &str) -> bool {
    NA_TOKENS.contains(&value.trim())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|h| {
            let count = seen.entry(h.clone()).or_insert(0);
            let name = if *count == 0 {
                h.clone()
            } else {
                format!("{}.{}", h, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Shortest decimal count (up to 6) that represents `v` exactly.
fn decimals_needed(v: f64) -> usize {
    (0..=6)
        .find(|&d| {
            let s = format!("{:.*}", d, v);
            s.parse::<f64>().map(|p| p == v).unwrap_or(false)
        })
        .unwrap_or(6)
}

pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    format!("{:.*}", decimals_needed(v).max(1), v)
}
