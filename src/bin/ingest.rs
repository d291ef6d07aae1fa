use anyhow::{Context, Result};
use bestsellers::{
    config::{Config, SourcesConfig},
    pipeline::{Pipeline, RunSummary},
    scheduler::TargetOutcome,
    store::RecordStore,
};
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let sources = SourcesConfig::load(config.sources_path())
        .with_context(|| format!("loading sources from {}", config.sources_path().display()))?;
    let targets = sources.enabled_targets();
    if targets.is_empty() {
        warn!("No enabled lists in {}", config.sources_path().display());
    }

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping after the current request");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    let store = RecordStore::new(config.data_path(), config.merge_policy());
    let pipeline = Pipeline::from_sources(&sources, store, shutdown_token)
        .context("building HTTP client")?;

    let summary = pipeline
        .run(&targets, Local::now().date_naive())
        .await
        .with_context(|| format!("writing {}", config.data_path().display()))?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.targets {
        let target = &report.target;
        match &report.outcome {
            TargetOutcome::Extracted(items) => println!(
                "[{}:{}] {} entries",
                target.channel,
                target.list_name,
                items.len()
            ),
            TargetOutcome::Empty => {
                println!("[{}:{}] no entries found", target.channel, target.list_name)
            }
            TargetOutcome::Failed(e) => println!(
                "[{}:{}] failed after {} attempt(s): {}",
                target.channel, target.list_name, report.attempts, e
            ),
            TargetOutcome::Cancelled => {
                println!("[{}:{}] cancelled", target.channel, target.list_name)
            }
        }
    }

    if summary.cancelled {
        println!("Run interrupted; nothing was saved.");
        return;
    }
    if summary.records.is_empty() {
        println!("No rows parsed. Check selectors/URLs.");
        return;
    }

    println!("\n=== 今日上榜書單 ({}) ===", summary.date);
    for record in &summary.records {
        println!(
            "{} | {} | {} | {}",
            record.channel, record.list_name, record.rank, record.title
        );
    }
    println!(
        "\nSaved: {} new, {} replaced, {} unchanged, {} rejected ({} rows in store)",
        summary.merge.inserted,
        summary.merge.replaced,
        summary.merge.skipped,
        summary.merge.rejected,
        summary.merge.total
    );
}
