#![warn(clippy::all, clippy::pedantic)]

use std::{path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod alerts;
mod config;
mod logs;
mod monitoring;
mod store;
mod worker;

use alerts::{AlertDispatcher, LogDispatcher, TwilioDispatcher};
use config::Config;
use logs::FileLogStore;
use monitoring::HttpProber;
use store::FileStore;
use worker::{Scheduler, Worker};

/// Background uptime checks with state change alerts
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file, created with defaults when missing
    #[arg(short, long, env = "UPPE_CONFIG")]
    config: Option<path::PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn dispatcher_for(config: &Config) -> Result<Arc<dyn AlertDispatcher>> {
    match (&config.alerts.twilio, config.alerts.enabled) {
        (Some(twilio), true) => {
            let dispatcher = TwilioDispatcher::new(twilio.clone()).context("Failed to build Twilio client")?;
            Ok(Arc::new(dispatcher))
        }
        (None, true) => {
            warn!("Alerts are enabled but no provider is configured, alerts will only be logged");
            Ok(Arc::new(LogDispatcher))
        }
        (_, false) => Ok(Arc::new(LogDispatcher)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_ref()).context("Failed to load config")?;

    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    let store = Arc::new(FileStore::new(&config.storage.data_dir));
    let log_store = Arc::new(FileLogStore::new(&config.storage.logs_dir));
    let prober = Arc::new(HttpProber::new()?);
    let dispatcher = dispatcher_for(&config)?;

    info!(
        data_dir = %config.storage.data_dir.display(),
        logs_dir = %config.storage.logs_dir.display(),
        alerts = dispatcher.name(),
        "Starting check service"
    );

    let worker = Arc::new(
        Worker::new(store, log_store, dispatcher, prober)
            .with_max_concurrent_probes(config.scheduler.max_concurrent_probes),
    );
    let scheduler = Scheduler::new(
        worker,
        Duration::from_secs(config.scheduler.scan_interval_seconds),
        Duration::from_secs(config.scheduler.rotation_interval_seconds),
    );
    let handles = scheduler.start();

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
