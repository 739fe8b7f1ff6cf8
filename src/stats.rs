//! Descriptive statistics (`describe`) over a [`Dataset`].

use serde::Serialize;

use crate::dataset::{Column, Dataset};
use crate::table::TextTable;

const NUMERIC_ROWS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const CATEGORICAL_ROWS: [&str; 4] = ["count", "unique", "top", "freq"];

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: usize,
}

/// Result of [`describe`]. Numeric columns are summarized when the dataset
/// has any; otherwise every column gets a categorical summary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "columns", rename_all = "snake_case")]
pub enum Description {
    Numeric(Vec<NumericSummary>),
    Categorical(Vec<CategoricalSummary>),
}

pub fn describe(dataset: &Dataset) -> Description {
    let numeric: Vec<&Column> = dataset
        .columns()
        .iter()
        .filter(|c| c.dtype.is_numeric())
        .collect();

    if numeric.is_empty() {
        Description::Categorical(dataset.columns().iter().map(summarize_categorical).collect())
    } else {
        Description::Numeric(numeric.into_iter().map(summarize_numeric).collect())
    }
}

fn summarize_numeric(column: &Column) -> NumericSummary {
    let mut values = column.numeric_values();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    let mean = if count == 0 {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / count as f64
    };

    NumericSummary {
        column: column.name.clone(),
        count,
        mean,
        std: std_dev(&values, mean),
        min: values.first().copied().unwrap_or(f64::NAN),
        q1: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q3: quantile(&values, 0.75),
        max: values.last().copied().unwrap_or(f64::NAN),
    }
}

fn summarize_categorical(column: &Column) -> CategoricalSummary {
    let counts = column.value_counts();
    let top = counts.first().cloned();
    CategoricalSummary {
        column: column.name.clone(),
        count: counts.iter().map(|(_, n)| n).sum(),
        unique: counts.len(),
        freq: top.as_ref().map(|(_, n)| *n).unwrap_or(0),
        top: top.map(|(label, _)| label),
    }
}

/// Sample standard deviation (n - 1 denominator).
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Linear-interpolated quantile of already sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

impl NumericSummary {
    /// Value for the `NUMERIC_ROWS[idx]` statistic.
    fn stat(&self, idx: usize) -> f64 {
        match idx {
            0 => self.count as f64,
            1 => self.mean,
            2 => self.std,
            3 => self.min,
            4 => self.q1,
            5 => self.median,
            6 => self.q3,
            _ => self.max,
        }
    }
}

fn fmt_stat(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", v)
    }
}

impl Description {
    /// Render as a statistic-by-column table.
    pub fn to_text(&self) -> String {
        match self {
            Description::Numeric(cols) => {
                let mut table = TextTable::new(cols.iter().map(|c| c.column.clone()).collect());
                for stat in 0..NUMERIC_ROWS.len() {
                    table.push_row(cols.iter().map(|c| fmt_stat(c.stat(stat))).collect());
                }
                table
                    .with_index(NUMERIC_ROWS.iter().map(|s| s.to_string()).collect())
                    .render()
            }
            Description::Categorical(cols) => {
                let mut table = TextTable::new(cols.iter().map(|c| c.column.clone()).collect());
                table.push_row(cols.iter().map(|c| c.count.to_string()).collect());
                table.push_row(cols.iter().map(|c| c.unique.to_string()).collect());
                table.push_row(
                    cols.iter()
                        .map(|c| c.top.clone().unwrap_or_else(|| "NaN".to_string()))
                        .collect(),
                );
                table.push_row(
                    cols.iter()
                        .map(|c| if c.count == 0 { "NaN".to_string() } else { c.freq.to_string() })
                        .collect(),
                );
                table
                    .with_index(CATEGORICAL_ROWS.iter().map(|s| s.to_string()).collect())
                    .render()
            }
        }
    }
}
