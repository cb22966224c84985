mod app;
mod theme;
mod ui;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use budgetgrid_core::{
    config::{self, AppConfig},
    ledger::{JsonLedger, LedgerDocument, LedgerStore},
    month::Month,
    range::DateRangeStore,
    view::{months_to_load, BudgetView},
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let today = Month::current();
    let seed_demo_data = config.seed_demo_data;
    let ledger = JsonLedger::open(config.ledger_path.clone(), move || {
        if seed_demo_data {
            LedgerDocument::demo(today)
        } else {
            LedgerDocument::default()
        }
    })
    .await?;
    info!(path = %ledger.path().display(), "ledger opened");

    let range = DateRangeStore::new(today, config.range_preset()?)?;
    let snapshot = ledger.load_range(&months_to_load(&range.range())).await?;
    let view = BudgetView::new(config.view_settings(), range, snapshot);

    let mut app = app::BudgetApp::new(Arc::new(ledger), view);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("budgetgrid.log");

    let env_filter = EnvFilter::from_default_env();

    // stdout belongs to the alternate screen, so only the file layer is installed
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
