//! Entry point: loads configuration, brings up the hardware link, and starts
//! the `Scheduler`'s `tokio` background loops until Ctrl-C or a fatal error.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::RwLock;

use g2motion::config::Config;
use g2motion::hardware::HardwareManager;
use g2motion::scheduler::{self, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "motion-core", version, about = "Jerk-limited multi-axis motion core")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(default_value = "motion.toml")]
    config: String,

    /// Run without opening the MCU serial port (planner/executor only).
    #[arg(long)]
    dry_run: bool,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    let level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("starting g2motion");

    let config = match Config::load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("could not load '{}': {} — using defaults", args.config, e);
            Config::default()
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("configuration invalid: {}", e);
        return Err(Box::new(e));
    }

    let mut hardware = HardwareManager::new(config.clone());
    if args.dry_run {
        tracing::info!("dry-run: skipping hardware connect/initialize");
    } else if let Err(e) = hardware.initialize().await {
        tracing::error!("hardware initialization failed: {}", e);
        return Err(Box::new(e));
    }

    let scheduler = Arc::new(RwLock::new(Scheduler::new(config)));
    let shutdown_tx = scheduler::start(scheduler.clone(), hardware);

    tracing::info!("scheduler running, press Ctrl-C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(());

    {
        let mut guard = scheduler.write().await;
        guard.shutdown_machine(g2motion::error::StatusCode::MachineShutdown, "operator shutdown");
    }

    Ok(())
}
