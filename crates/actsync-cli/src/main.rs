use std::sync::Arc;

use actsync_storage::{migrate, ActivityStore, PgActivityStore};
use actsync_sync::{build_scheduler, maybe_build_scheduler, pipeline_from_config, SyncConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "actsync-cli")]
#[command(about = "Campus activity crawler and store synchronizer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one crawl-to-reconcile pass
    Sync,
    /// Apply database migrations
    Migrate,
    /// Serve the cron trigger and activity views
    Serve,
    /// Run syncs on the configured cron schedule until interrupted
    Schedule,
    /// Print stored activities as JSON
    Activities,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actsync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let summary = actsync_sync::run_sync_once_from_env().await?;
            println!(
                "sync complete: run_id={} urls={} inserted={} updated={} extraction_failures={} persistence_failures={}",
                summary.run_id,
                summary.listing_urls,
                summary.inserted,
                summary.updated,
                summary.extraction_failures,
                summary.persistence_failures
            );
        }
        Commands::Migrate => {
            let store = PgActivityStore::connect(&config.database_url).await?;
            migrate(store.pool()).await?;
            println!("migrations applied");
        }
        Commands::Serve => {
            let pipeline = Arc::new(pipeline_from_config(&config).await?);
            let scheduler = maybe_build_scheduler(pipeline.clone(), &config).await?;
            if let Some(sched) = &scheduler {
                sched.start().await.context("starting scheduler")?;
                info!(cron = %config.sync_cron, "scheduler started alongside web server");
            }
            actsync_web::serve(pipeline, actsync_web::web_port_from_env()).await?;
        }
        Commands::Schedule => {
            let pipeline = Arc::new(pipeline_from_config(&config).await?);
            let mut sched = build_scheduler(pipeline, &config.sync_cron).await?;
            sched.start().await.context("starting scheduler")?;
            info!(cron = %config.sync_cron, "scheduler started, press ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Activities => {
            let store = PgActivityStore::connect(&config.database_url).await?;
            let activities = store.list().await?;
            println!("{}", serde_json::to_string_pretty(&activities)?);
        }
    }

    Ok(())
}
