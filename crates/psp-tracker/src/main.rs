mod bootstrap;
mod render;

use anyhow::Result;
use tracker_core::models::{Metric, ShareBasis};
use tracker_core::settings::Settings;
use tracker_runtime::loader::{LoaderConfig, WorkbookLoader};
use tracker_runtime::session::AnalysisSession;

use crate::render::JsonReport;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("PSP Tracker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        "File: {}, share basis: {}, metric: {:?}",
        settings.file.display(),
        settings.share_basis,
        settings.metric
    );

    let loader = WorkbookLoader::new(LoaderConfig::from(&settings));
    let dataset = loader.load(&settings.file).await?;

    let mut session = AnalysisSession::with_selection(dataset.records, settings.selection());
    session.set_share_basis(settings.share_basis);

    let dropped = settings
        .selection()
        .payment_options
        .len()
        .saturating_sub(session.selection().payment_options.len());
    if dropped > 0 {
        tracing::warn!(
            "{} payment option(s) are not available for the selected psp/week/country and were ignored",
            dropped
        );
    }

    if settings.wants_json() {
        let report = JsonReport {
            metadata: &dataset.metadata,
            ingestion: &dataset.report,
            snapshot: session.snapshot(&Metric::ALL),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", render::overview_table(&session.overview(), &dataset.report));
    println!();
    println!("{}", render::breakdown_table(&session.country_breakdown()));
    println!();
    println!("{}", render::pivot_table(&session.pivot(settings.metric)));

    if settings.metric.is_share() {
        let basis = match session.share_basis() {
            ShareBasis::CountryTotal => "all weeks of each country",
            ShareBasis::WeekTotal => "all countries of each week",
        };
        println!("\nShares are relative to {}.", basis);
    }

    Ok(())
}
