//! Plain-text and JSON rendering of a session.

use serde::Serialize;
use tracker_core::formatting::{format_count, format_metric, format_percent, render_table};
use tracker_data::aggregator::PivotTable;
use tracker_data::analysis::{CountryBreakdown, Overview};
use tracker_data::ingest::IngestionReport;
use tracker_runtime::loader::LoadMetadata;
use tracker_runtime::session::SessionSnapshot;

/// Everything `--format json` prints.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub metadata: &'a LoadMetadata,
    pub ingestion: &'a IngestionReport,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

pub fn overview_table(overview: &Overview, report: &IngestionReport) -> String {
    let headers = vec!["Overview".to_string(), String::new()];
    let rows = vec![
        vec!["Countries".to_string(), overview.country_count.to_string()],
        vec!["PSPs".to_string(), overview.psp_count.to_string()],
        vec!["Weeks".to_string(), overview.week_count.to_string()],
        vec!["Total Press Buy".to_string(), format_count(overview.total_press_buy)],
        vec!["Total Converted".to_string(), format_count(overview.total_converted)],
        vec!["Conversion Rate".to_string(), format_percent(overview.conversion_rate)],
        vec![
            "Rows read / dropped".to_string(),
            format!("{} / {}", report.rows_read, report.rows_dropped),
        ],
    ];
    render_table(&headers, &rows)
}

pub fn breakdown_table(countries: &[CountryBreakdown]) -> String {
    let headers: Vec<String> = ["Country / PSP", "Press Buy", "Converted", "Rate"]
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for country in countries {
        rows.push(vec![
            country.country.clone(),
            format_count(country.totals.press_buy_count),
            format_count(country.totals.converted_count),
            format_percent(country.totals.conversion_rate),
        ]);
        for psp in &country.psps {
            rows.push(vec![
                format!("  {}", psp.psp),
                format_count(psp.totals.press_buy_count),
                format_count(psp.totals.converted_count),
                format_percent(psp.totals.conversion_rate),
            ]);
        }
    }
    render_table(&headers, &rows)
}

pub fn pivot_table(pivot: &PivotTable) -> String {
    let mut headers = vec!["Week".to_string()];
    headers.extend(pivot.series.iter().cloned());

    let rows: Vec<Vec<String>> = pivot
        .dense_rows()
        .into_iter()
        .map(|(week, values)| {
            let mut row = vec![week];
            row.extend(values.into_iter().map(|v| format_metric(v, pivot.metric)));
            row
        })
        .collect();

    format!("{}\n{}", pivot.metric.title(), render_table(&headers, &rows))
}
