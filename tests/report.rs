mod common;

use campaign_report::config::ReportConfig;
use campaign_report::ingest::{self, IngestOptions, RawUpload};
use campaign_report::metrics::MetricValue;
use campaign_report::report::{self, Report, ReportError};

use common::{CAMPAIGN_CSV, SAMPLE_CSV};

fn parse(content: &str) -> campaign_report::data::Table {
    ingest::parse(
        &RawUpload::new(content.as_bytes().to_vec(), "data.csv"),
        &IngestOptions::default(),
    )
    .expect("sample input parses")
}

fn metric(report: &Report, name: &str) -> MetricValue {
    report
        .metrics
        .iter()
        .find(|metric| metric.name == name)
        .unwrap_or_else(|| panic!("metric '{name}' missing from report"))
        .value
}

fn has_metric(report: &Report, name: &str) -> bool {
    report.metrics.iter().any(|metric| metric.name == name)
}

fn three_role_config() -> ReportConfig {
    ReportConfig {
        conversions_column: None,
        ..ReportConfig::default()
    }
}

#[test]
fn totals_ratios_and_performers_for_a_small_table() {
    let table = parse(SAMPLE_CSV);
    let report = report::build(&table, &three_role_config()).unwrap();

    assert_eq!(metric(&report, "rows"), MetricValue::Integer(2));
    assert_eq!(metric(&report, "total_spend"), MetricValue::Integer(30));
    assert_eq!(metric(&report, "total_clicks"), MetricValue::Integer(6));
    assert_eq!(metric(&report, "total_impressions"), MetricValue::Integer(300));
    assert_eq!(metric(&report, "avg_spend"), MetricValue::Integer(15));
    assert_eq!(metric(&report, "ctr"), MetricValue::Float(0.02));
    assert_eq!(metric(&report, "top_performer_row"), MetricValue::Integer(1));
    assert_eq!(metric(&report, "bottom_performer_row"), MetricValue::Integer(0));
}

#[test]
fn metric_order_is_fixed() {
    let table = parse(SAMPLE_CSV);
    let report = report::build(&table, &three_role_config()).unwrap();
    let names: Vec<&str> = report
        .metrics
        .iter()
        .map(|metric| metric.name.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "rows",
            "total_spend",
            "avg_spend",
            "missing_spend",
            "total_clicks",
            "avg_clicks",
            "missing_clicks",
            "total_impressions",
            "avg_impressions",
            "missing_impressions",
            "ctr",
            "cost_per_click",
            "top_performer_row",
            "bottom_performer_row",
        ]
    );
}

#[test]
fn identical_tables_serialize_to_identical_reports() {
    let config = ReportConfig {
        date_column: Some("date".to_string()),
        ranking_column: Some("conversions".to_string()),
        ..ReportConfig::default()
    };
    let first = report::build(&parse(CAMPAIGN_CSV), &config).unwrap();
    let second = report::build(&parse(CAMPAIGN_CSV), &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn report_serializes_metrics_then_summary_then_recommendations() {
    let table = parse(SAMPLE_CSV);
    let report = report::build(&table, &three_role_config()).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    let metrics_at = json.find("\"metrics\"").unwrap();
    let summary_at = json.find("\"summary\"").unwrap();
    let recommendations_at = json.find("\"recommendations\"").unwrap();
    assert!(metrics_at < summary_at && summary_at < recommendations_at);
    assert!(json.contains("{\"name\":\"total_spend\",\"value\":30}"));

    let parsed: Report = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn missing_mapped_columns_are_named() {
    let table = parse("cost,clicks\n1,2\n");
    let err = report::build(&table, &three_role_config()).unwrap_err();
    assert_eq!(
        err,
        ReportError::MissingColumn {
            column: "spend".to_string()
        }
    );
    assert_eq!(err.status_code(), 422);
}

#[test]
fn non_numeric_cells_are_named_with_row_and_column() {
    let table = parse("spend,clicks,impressions\n10,2,100\n20,many,200\n");
    let err = report::build(&table, &three_role_config()).unwrap_err();
    assert_eq!(
        err,
        ReportError::InvalidValue {
            column: "clicks".to_string(),
            row_index: 1,
            value: "many".to_string()
        }
    );
}

#[test]
fn empty_cells_count_as_zero_and_feed_the_missing_diagnostic() {
    let table = parse("spend,clicks,impressions\n10,,100\n,4,200\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert_eq!(metric(&report, "total_spend"), MetricValue::Integer(10));
    assert_eq!(metric(&report, "avg_spend"), MetricValue::Integer(5));
    assert_eq!(metric(&report, "missing_spend"), MetricValue::Integer(1));
    assert_eq!(metric(&report, "missing_clicks"), MetricValue::Integer(1));
    assert_eq!(metric(&report, "missing_impressions"), MetricValue::Integer(0));
}

#[test]
fn a_fully_empty_column_keeps_total_and_mean_at_zero() {
    let table = parse("spend,clicks,impressions\n,1,10\n,2,20\n,3,30\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert_eq!(metric(&report, "total_spend"), MetricValue::Integer(0));
    assert_eq!(metric(&report, "avg_spend"), MetricValue::Integer(0));
    assert_eq!(metric(&report, "missing_spend"), MetricValue::Integer(3));
}

#[test]
fn zero_denominator_ratios_are_omitted_entirely() {
    let table = parse("spend,clicks,impressions\n10,0,0\n20,0,0\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert!(!has_metric(&report, "ctr"));
    assert!(!has_metric(&report, "cost_per_click"));
    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("NaN"));
    assert!(!json.contains("null"));
}

#[test]
fn overflowing_totals_never_reach_the_report() {
    // Each cell is finite; the column sum is not.
    let table = parse("spend,clicks,impressions\n1,1e308,10\n2,1e308,20\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert!(!has_metric(&report, "total_clicks"));
    assert!(!has_metric(&report, "avg_clicks"));
    assert!(!has_metric(&report, "ctr"));
    assert!(!has_metric(&report, "cost_per_click"));
    assert_eq!(metric(&report, "missing_clicks"), MetricValue::Integer(0));
    assert_eq!(metric(&report, "total_spend"), MetricValue::Integer(3));
    assert_eq!(metric(&report, "total_impressions"), MetricValue::Integer(30));
    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("null"));
    assert!(!report.summary.contains("inf"));
    assert!(!report.summary.contains("NaN"));
}

#[test]
fn roi_relates_conversions_to_spend() {
    let table = parse("spend,clicks,impressions,conversions\n10,2,100,1\n20,4,200,2\n");
    let report = report::build(&table, &ReportConfig::default()).unwrap();
    assert_eq!(metric(&report, "roi"), MetricValue::Integer(10));
    assert_eq!(metric(&report, "cost_per_conversion"), MetricValue::Integer(10));
}

#[test]
fn negative_values_aggregate_without_clipping() {
    let table = parse("spend,clicks,impressions\n10,2,100\n-4,1,50\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert_eq!(metric(&report, "total_spend"), MetricValue::Integer(6));
    assert_eq!(metric(&report, "avg_spend"), MetricValue::Integer(3));
}

#[test]
fn ranking_tie_prefers_the_earliest_row() {
    let table = parse("spend,clicks,impressions\n20,1,10\n20,2,20\n5,3,30\n");
    let report = report::build(&table, &three_role_config()).unwrap();
    assert_eq!(metric(&report, "top_performer_row"), MetricValue::Integer(0));
    assert_eq!(metric(&report, "bottom_performer_row"), MetricValue::Integer(2));
}

#[test]
fn unmapped_ranking_skips_performer_metrics() {
    let config = ReportConfig {
        conversions_column: None,
        ranking_column: None,
        ..ReportConfig::default()
    };
    let report = report::build(&parse(SAMPLE_CSV), &config).unwrap();
    assert!(!has_metric(&report, "top_performer_row"));
    assert!(!has_metric(&report, "bottom_performer_row"));
}

#[test]
fn date_column_adds_the_period_and_dated_performers_to_the_summary() {
    let config = ReportConfig {
        date_column: Some("date".to_string()),
        ranking_column: Some("conversions".to_string()),
        ..ReportConfig::default()
    };
    let report = report::build(&parse(CAMPAIGN_CSV), &config).unwrap();
    assert!(report.summary.contains("2024-03-01 through 2024-03-05"));
    // Conversions peak on 2024-03-03 (24) and bottom out on 2024-03-04 (6).
    assert!(report.summary.contains("best day by conversions was 2024-03-03 (24)"));
    assert!(report.summary.contains("the weakest was 2024-03-04 (6)"));
    assert_eq!(metric(&report, "top_performer_row"), MetricValue::Integer(2));
    assert_eq!(metric(&report, "bottom_performer_row"), MetricValue::Integer(3));
}

#[test]
fn unparseable_dates_fail_with_the_offending_cell() {
    let config = ReportConfig {
        date_column: Some("date".to_string()),
        ..ReportConfig::default()
    };
    let table = parse("date,spend,clicks,impressions,conversions\n2024-03-01,1,2,3,4\nsoon,5,6,7,8\n");
    let err = report::build(&table, &config).unwrap_err();
    assert_eq!(
        err,
        ReportError::InvalidValue {
            column: "date".to_string(),
            row_index: 1,
            value: "soon".to_string()
        }
    );
}

#[test]
fn summary_reports_counts_totals_and_rates() {
    let table = parse(SAMPLE_CSV);
    let report = report::build(&table, &three_role_config()).unwrap();
    assert!(report.summary.contains("Analyzed 2 data row(s) across 3 column(s)."));
    assert!(report.summary.contains("Overall totals: spend 30, clicks 6, impressions 300."));
    assert!(report.summary.contains("Click-through rate was 2.00%."));
    assert!(report.summary.contains("Row 1 ranked highest by spend (20)"));
}

#[test]
fn reports_on_campaign_data_compute_every_ratio() {
    let config = ReportConfig {
        date_column: Some("date".to_string()),
        ..ReportConfig::default()
    };
    let report = report::build(&parse(CAMPAIGN_CSV), &config).unwrap();
    assert_eq!(metric(&report, "total_clicks"), MetricValue::Integer(1440));
    assert_eq!(metric(&report, "total_impressions"), MetricValue::Integer(50300));
    assert_eq!(metric(&report, "total_conversions"), MetricValue::Integer(78));
    assert_eq!(
        metric(&report, "ctr"),
        MetricValue::Float(1440.0 / 50300.0)
    );
    assert_eq!(
        metric(&report, "conversion_rate"),
        MetricValue::Float(78.0 / 1440.0)
    );
    assert!(has_metric(&report, "cost_per_click"));
    assert!(has_metric(&report, "cost_per_conversion"));
    assert!(has_metric(&report, "roi"));
    assert!(!report.recommendations.is_empty());
}
