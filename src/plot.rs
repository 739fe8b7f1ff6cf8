use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Histogram,
    LineChart,
    BarChart,
}

impl ChartKind {
    pub fn aggregation(self) -> Aggregation {
        match self {
            ChartKind::Histogram | ChartKind::BarChart => Aggregation::ValueCounts,
            ChartKind::LineChart => Aggregation::Raw,
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Histogram => write!(f, "Histogram"),
            ChartKind::LineChart => write!(f, "Line Chart"),
            ChartKind::BarChart => write!(f, "Bar Chart"),
        }
    }
}

impl FromStr for ChartKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "histogram" | "hist" => Ok(ChartKind::Histogram),
            "linechart" | "line" => Ok(ChartKind::LineChart),
            "barchart" | "bar" => Ok(ChartKind::BarChart),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown chart type '{}'; expected Histogram, Line Chart or Bar Chart",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Occurrences of each distinct value, most frequent first.
    ValueCounts,
    /// Column values in row order.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: Option<f64>,
}

/// Data behind one auto-plot widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub column: String,
    pub kind: ChartKind,
    pub aggregation: Aggregation,
    pub points: Vec<ChartPoint>,
}

pub fn build_chart(dataset: &Dataset, column: &str, kind: ChartKind) -> AppResult<ChartSpec> {
    let col = dataset.column(column).ok_or_else(|| {
        AppError::InvalidInput(format!("Unable to plot chart: unknown column '{}'", column))
    })?;

    let aggregation = kind.aggregation();
    let points: Vec<ChartPoint> = match aggregation {
        Aggregation::ValueCounts => col
            .value_counts()
            .into_iter()
            .map(|(label, count)| ChartPoint {
                label,
                value: Some(count as f64),
            })
            .collect(),
        Aggregation::Raw => {
            if !col.dtype.is_numeric() {
                return Err(AppError::InvalidInput(format!(
                    "Unable to plot chart: column '{}' has dtype {} and cannot be drawn as a line",
                    column, col.dtype
                )));
            }
            col.values
                .iter()
                .enumerate()
                .map(|(idx, v)| ChartPoint {
                    label: idx.to_string(),
                    value: v.as_f64(),
                })
                .collect()
        }
    };

    if points.iter().all(|p| p.value.is_none()) {
        return Err(AppError::InvalidInput(format!(
            "Unable to plot chart: column '{}' has no values",
            column
        )));
    }

    Ok(ChartSpec {
        column: column.to_string(),
        kind,
        aggregation,
        points,
    })
}

/// Draw the chart as an SVG document.
pub fn render_svg(spec: &ChartSpec) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (900, 500)).into_drawing_area();
        root.fill(&WHITE)?;
        match spec.aggregation {
            Aggregation::ValueCounts => draw_bars(&root, spec)?,
            Aggregation::Raw => draw_line(&root, spec)?,
        }
        root.present()?;
    }
    Ok(svg)
}

fn value_range(spec: &ChartSpec) -> (f64, f64) {
    let values = spec.points.iter().filter_map(|p| p.value);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

fn draw_bars<DB: DrawingBackend>(root: &DrawingArea<DB, plotters::coord::Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (_, max) = value_range(spec);
    let n = spec.points.len();
    let caption = format!("{} of {}", spec.kind, spec.column);

    let mut chart = ChartBuilder::on(root)
        .margin(20)
        .caption(caption, ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..n as f64, 0f64..max.max(1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.min(30))
        .x_label_formatter(&|x| {
            let idx = x.floor() as usize;
            spec.points.get(idx).map(|p| p.label.clone()).unwrap_or_default()
        })
        .y_desc("count")
        .draw()?;

    chart.draw_series(spec.points.iter().enumerate().map(|(idx, p)| {
        let x = idx as f64;
        Rectangle::new(
            [(x + 0.1, 0.0), (x + 0.9, p.value.unwrap_or(0.0))],
            BLUE.mix(0.6).filled(),
        )
    }))?;
    Ok(())
}

fn draw_line<DB: DrawingBackend>(root: &DrawingArea<DB, plotters::coord::Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (min, max) = value_range(spec);
    let n = spec.points.len().max(2);
    let caption = format!("{} of {}", spec.kind, spec.column);

    let mut chart = ChartBuilder::on(root)
        .margin(20)
        .caption(caption, ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(n - 1) as f64, min..max)?;

    chart
        .configure_mesh()
        .x_desc("row")
        .y_desc(spec.column.as_str())
        .draw()?;

    // missing values split the line into separate segments
    let mut segment: Vec<(f64, f64)> = Vec::new();
    for (idx, p) in spec.points.iter().enumerate() {
        match p.value {
            Some(v) => segment.push((idx as f64, v)),
            None if !segment.is_empty() => {
                chart.draw_series(LineSeries::new(std::mem::take(&mut segment), &BLUE))?;
            }
            None => {}
        }
    }
    if !segment.is_empty() {
        chart.draw_series(LineSeries::new(segment, &BLUE))?;
    }
    Ok(())
}
