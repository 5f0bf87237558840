use anyhow::{Context, Result};
use clap::Parser;
use lockmon::cli::Cli;
use lockmon::config::MonitorConfig;
use lockmon::http_server::HttpServer;
use lockmon::monitor::Monitor;
use lockmon::stats;
use lockmon::workload::{Workload, WorkloadConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` raises the level to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file if given, then apply command-line overrides
fn load_config(args: &Cli) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.max_workers == 0 && !args.no_workload {
        anyhow::bail!("Invalid value for --max-workers: 0 (must be >= 1)");
    }

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let monitor = Arc::new(Monitor::new(&config));

    let workload = (!args.no_workload).then(|| {
        Workload::start(
            Arc::clone(&monitor),
            WorkloadConfig {
                threshold: Duration::from_millis(args.threshold_ms),
                max_workers: args.max_workers,
                ..Default::default()
            },
        )
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let server = HttpServer::new(&config, Arc::clone(&monitor));
    let served = runtime.block_on(async {
        let listener = server.bind().await?;
        eprintln!("Press Ctrl+C to stop...");
        server.serve(listener, wait_for_ctrl_c()).await
    });

    if let Some(workload) = workload {
        workload.stop();
        eprintln!("All workers stopped. Exiting.");
    }

    if args.summary {
        stats::print_summary(&monitor.get_category_stats());
    }

    served?;
    Ok(())
}
