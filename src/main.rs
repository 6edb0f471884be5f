//! # redirect-check
//!
//! Loads persisted redirect state, optionally refreshes it from the
//! configured sources, then reads navigation URLs from stdin (one per line)
//! and prints the redirect decision for each. Throttle updates are written
//! back to the state file as they happen.

use clap::Parser;
use redirector::{
    AgentConfig, HttpSource, JsonFileStore, LogNotifier, RedirectController, RefreshService,
};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "redirect-check")]
#[command(about = "Evaluate navigation URLs against redirect rules", long_about = None)]
struct Cli {
    /// Fetch rules and settings before evaluating
    #[arg(short, long)]
    refresh: bool,

    /// State file (overrides REDIRECTOR_STORE_PATH)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Tab id reported with each decision
    #[arg(short, long, default_value_t = 0)]
    tab: i64,

    /// Act as if the action button was clicked before evaluating
    #[arg(long)]
    click: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = AgentConfig::from_env();
    if let Some(path) = cli.store {
        config.store_path = path;
    }

    let store = Arc::new(JsonFileStore::open(&config.store_path)?);
    let context = Arc::new(RefreshService::restore(store.as_ref())?);
    println!("✓ State loaded from {}", config.store_path.display());
    println!("  - Rules: {}", context.rules_snapshot().len());
    println!("  - Throttle records: {}", context.throttle_snapshot().len());

    if cli.refresh {
        let source = Arc::new(HttpSource::new(
            config.rules_url.clone(),
            config.settings_url.clone(),
            config.fetch_timeout,
        )?);
        let report = RefreshService::new(context.clone(), source.clone(), source)
            .with_store(store.clone())
            .refresh_all()
            .await;

        match report.rules {
            Ok(stats) => println!(
                "✓ Refreshed {} rules ({} rejected) from {}",
                stats.rules_loaded, stats.rules_rejected, config.rules_url
            ),
            Err(e) => eprintln!("✗ Rule refresh failed, using stored rules: {}", e),
        }
        if let Err(e) = report.settings {
            eprintln!("✗ Settings refresh failed, using stored settings: {}", e);
        }
    }
    println!();

    let controller = RedirectController::new(context)
        .with_store(store)
        .with_notifier(Arc::new(LogNotifier));
    if cli.click && !controller.on_action_clicked() {
        println!("  (no notice: tracking flags off)");
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        let url = line.trim();
        if url.is_empty() {
            continue;
        }

        match controller.on_navigate(cli.tab, url, redirector::types::now()) {
            Some(action) => println!("{} -> {} [{}]", url, action.url, action.rule_key),
            None => println!("{} -> (no redirect)", url),
        }
    }

    Ok(())
}
