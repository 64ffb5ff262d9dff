use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    config::ReportConfig,
    data::{Cell, Table, parse_naive_date, parse_number},
    report::ReportError,
};

/// A report metric value. Whole values surface as integers so totals of
/// count-like columns serialize as counts rather than floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    pub fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
            MetricValue::Integer(value as i64)
        } else {
            MetricValue::Float(value)
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Integer(value) => *value as f64,
            MetricValue::Float(value) => *value,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(value) => write!(f, "{value}"),
            MetricValue::Float(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

/// Ordered metric collection. Order is part of the report contract, so the
/// backing store is a vector; name lookup is for rules and summary text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    metrics: Vec<Metric>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: MetricValue) {
        self.metrics.push(Metric {
            name: name.into(),
            value,
        });
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|metric| metric.name == name)
            .map(|metric| metric.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowHighlight {
    pub row_index: usize,
    pub value: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    pub column: String,
    pub top: RowHighlight,
    pub bottom: RowHighlight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMetrics {
    pub metrics: MetricSet,
    pub performance: Option<Performance>,
    pub period: Option<Period>,
}

/// Computes every metric the mapping asks for, in the fixed report order:
/// row count, per-role total/avg/missing triples, derived ratios, then the
/// performer rows. Every emitted value is finite: ratios are dropped when a
/// denominator is unmapped, zero, or the division leaves f64's range, and a
/// total that overflows f64 is dropped along with its mean.
pub fn compute(table: &Table, config: &ReportConfig) -> Result<TableMetrics, ReportError> {
    let mut metrics = MetricSet::new();
    metrics.push("rows", MetricValue::Integer(table.row_count() as i64));

    let mut totals: HashMap<&'static str, f64> = HashMap::new();
    for (role, column) in config.role_columns() {
        let series = numeric_column(table, column)?;
        // Cells are finite but their sum can overflow.
        if series.total.is_finite() {
            metrics.push(format!("total_{role}"), MetricValue::from_f64(series.total));
            metrics.push(format!("avg_{role}"), MetricValue::from_f64(series.mean()));
            totals.insert(role, series.total);
        } else {
            warn!("Total for column '{column}' overflows f64; omitting total_{role} and avg_{role}");
        }
        metrics.push(
            format!("missing_{role}"),
            MetricValue::Integer(series.missing as i64),
        );
    }

    push_ratio(&mut metrics, "ctr", &totals, "clicks", "impressions", 1.0);
    push_ratio(&mut metrics, "conversion_rate", &totals, "conversions", "clicks", 1.0);
    push_ratio(&mut metrics, "cost_per_click", &totals, "spend", "clicks", 1.0);
    push_ratio(&mut metrics, "cost_per_conversion", &totals, "spend", "conversions", 1.0);
    // roi reads as conversions per 100 units of spend.
    push_ratio(&mut metrics, "roi", &totals, "conversions", "spend", 100.0);

    let dates = match config.date_column.as_deref() {
        Some(column) => Some(date_values(table, column)?),
        None => None,
    };
    let period = dates.as_ref().and_then(|dates| {
        let start = dates.iter().flatten().min().copied()?;
        let end = dates.iter().flatten().max().copied()?;
        Some(Period { start, end })
    });

    let performance = rank_performers(table, config, dates.as_deref())?;
    if let Some(performance) = &performance {
        metrics.push(
            "top_performer_row",
            MetricValue::Integer(performance.top.row_index as i64),
        );
        metrics.push(
            "bottom_performer_row",
            MetricValue::Integer(performance.bottom.row_index as i64),
        );
    }

    Ok(TableMetrics {
        metrics,
        performance,
        period,
    })
}

#[derive(Debug)]
struct NumericColumn {
    values: Vec<f64>,
    total: f64,
    missing: usize,
}

impl NumericColumn {
    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.total / self.values.len() as f64
        }
    }
}

/// Reads a column as numbers. Empty cells count as zero and are tallied in
/// the missing diagnostic; non-numeric text is a hard error naming the cell.
fn numeric_column(table: &Table, column: &str) -> Result<NumericColumn, ReportError> {
    let index = table
        .column_index(column)
        .ok_or_else(|| ReportError::MissingColumn {
            column: column.to_string(),
        })?;
    let mut values = Vec::with_capacity(table.row_count());
    let mut total = 0.0;
    let mut missing = 0;
    for (row_index, row) in table.rows().iter().enumerate() {
        let value = match row.cell(index) {
            Cell::Empty => {
                missing += 1;
                0.0
            }
            Cell::Text(text) => {
                parse_number(text).ok_or_else(|| ReportError::InvalidValue {
                    column: column.to_string(),
                    row_index,
                    value: text.clone(),
                })?
            }
        };
        total += value;
        values.push(value);
    }
    Ok(NumericColumn {
        values,
        total,
        missing,
    })
}

fn date_values(table: &Table, column: &str) -> Result<Vec<Option<NaiveDate>>, ReportError> {
    let index = table
        .column_index(column)
        .ok_or_else(|| ReportError::MissingColumn {
            column: column.to_string(),
        })?;
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row_index, row)| match row.cell(index) {
            Cell::Empty => Ok(None),
            Cell::Text(text) => parse_naive_date(text).map(Some).ok_or_else(|| {
                ReportError::InvalidValue {
                    column: column.to_string(),
                    row_index,
                    value: text.clone(),
                }
            }),
        })
        .collect()
}

fn push_ratio(
    metrics: &mut MetricSet,
    name: &'static str,
    totals: &HashMap<&'static str, f64>,
    numerator: &str,
    denominator: &str,
    scale: f64,
) {
    if let (Some(numerator), Some(denominator)) = (totals.get(numerator), totals.get(denominator))
        && *denominator != 0.0
    {
        let ratio = numerator * scale / denominator;
        // Finite totals of extreme magnitudes can still overflow the division.
        if ratio.is_finite() {
            metrics.push(name, MetricValue::from_f64(ratio));
        }
    }
}

fn rank_performers(
    table: &Table,
    config: &ReportConfig,
    dates: Option<&[Option<NaiveDate>]>,
) -> Result<Option<Performance>, ReportError> {
    let Some(column) = config.ranking_column.as_deref() else {
        return Ok(None);
    };
    let series = numeric_column(table, column)?;
    let mut top = 0;
    let mut bottom = 0;
    // Strict comparisons keep the earliest row on ties.
    for (index, value) in series.values.iter().enumerate() {
        if *value > series.values[top] {
            top = index;
        }
        if *value < series.values[bottom] {
            bottom = index;
        }
    }
    let highlight = |row_index: usize| RowHighlight {
        row_index,
        value: series.values[row_index],
        date: dates.and_then(|dates| dates[row_index]),
    };
    Ok(Some(Performance {
        column: column.to_string(),
        top: highlight(top),
        bottom: highlight(bottom),
    }))
}
