use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::ReportConfig,
    data::Table,
    metrics::{self, Metric, MetricValue, Performance, TableMetrics},
    rules::{FALLBACK_RECOMMENDATION, RuleSet},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("Required column '{column}' is not present in the table")]
    MissingColumn { column: String },
    #[error("Invalid value '{value}' for column '{column}' at row {row_index}")]
    InvalidValue {
        column: String,
        row_index: usize,
        value: String,
    },
}

impl ReportError {
    /// HTTP status an embedding layer should answer with: the upload was
    /// readable but its content cannot be processed.
    pub fn status_code(&self) -> u16 {
        422
    }
}

/// The finished report. Serialization order is part of the contract:
/// metrics, then summary, then recommendations. Identical input tables
/// always serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metrics: Vec<Metric>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// Turns a validated table into a report. Alternate builders (a hosted
/// text service, a different rule pack) plug in behind this trait without
/// touching the ingestion pipeline.
pub trait ReportBuilder {
    fn build(&self, table: &Table) -> Result<Report, ReportError>;
}

/// The default builder: deterministic metrics, a composed summary, and
/// rule-driven recommendations.
pub struct RuleReportBuilder {
    config: ReportConfig,
    rules: RuleSet,
}

impl RuleReportBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            rules: RuleSet::built_in(),
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }
}

impl ReportBuilder for RuleReportBuilder {
    fn build(&self, table: &Table) -> Result<Report, ReportError> {
        let computed = metrics::compute(table, &self.config)?;
        let summary = compose_summary(table, &computed);
        let mut recommendations = self.rules.evaluate(&computed.metrics);
        if recommendations.is_empty() {
            recommendations.push(FALLBACK_RECOMMENDATION.to_string());
        }
        debug!(
            "Built report: {} metric(s), {} recommendation(s)",
            computed.metrics.len(),
            recommendations.len()
        );
        Ok(Report {
            metrics: computed.metrics.into_metrics(),
            summary,
            recommendations,
        })
    }
}

/// Builds a report with the built-in rule set.
pub fn build(table: &Table, config: &ReportConfig) -> Result<Report, ReportError> {
    RuleReportBuilder::new(config.clone()).build(table)
}

fn compose_summary(table: &Table, computed: &TableMetrics) -> String {
    let mut sentences: Vec<String> = Vec::new();
    sentences.push(format!(
        "Analyzed {} data row(s) across {} column(s).",
        table.row_count(),
        table.column_count()
    ));
    if let Some(period) = &computed.period {
        sentences.push(format!(
            "The data covers {} through {}.",
            period.start.format("%Y-%m-%d"),
            period.end.format("%Y-%m-%d")
        ));
    }
    let totals: Vec<String> = [
        ("spend", "total_spend"),
        ("clicks", "total_clicks"),
        ("impressions", "total_impressions"),
        ("conversions", "total_conversions"),
    ]
    .iter()
    .filter_map(|(label, name)| {
        computed
            .metrics
            .get(name)
            .map(|value| format!("{label} {value}"))
    })
    .collect();
    if !totals.is_empty() {
        sentences.push(format!("Overall totals: {}.", totals.iter().join(", ")));
    }
    if let Some(ctr) = computed.metrics.get("ctr") {
        sentences.push(format!(
            "Click-through rate was {}.",
            format_percent(ctr.as_f64())
        ));
    }
    if let Some(rate) = computed.metrics.get("conversion_rate") {
        sentences.push(format!(
            "Conversion rate was {}.",
            format_percent(rate.as_f64())
        ));
    }
    if let Some(performance) = &computed.performance {
        sentences.push(performer_sentence(performance));
    }
    sentences.join(" ")
}

fn performer_sentence(performance: &Performance) -> String {
    let top = &performance.top;
    let bottom = &performance.bottom;
    match (top.date, bottom.date) {
        (Some(top_date), Some(bottom_date)) => format!(
            "The best day by {} was {} ({}); the weakest was {} ({}).",
            performance.column,
            top_date.format("%Y-%m-%d"),
            format_value(top.value),
            bottom_date.format("%Y-%m-%d"),
            format_value(bottom.value)
        ),
        _ => format!(
            "Row {} ranked highest by {} ({}); row {} ranked lowest ({}).",
            top.row_index,
            performance.column,
            format_value(top.value),
            bottom.row_index,
            format_value(bottom.value)
        ),
    }
}

/// Ratios are stored as plain ratios; the summary presents them the way a
/// reader expects rates: as percentages.
fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

fn format_value(value: f64) -> String {
    MetricValue::from_f64(value).to_string()
}
