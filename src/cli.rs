//! CLI argument parsing for the lockmon demo server

use crate::config::MonitorConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockmon")]
#[command(version)]
#[command(about = "Serve long-lock records and category statistics over HTTP", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// HTTP listen address (overrides the config file)
    #[arg(short = 'a', long = "addr", value_name = "ADDR")]
    pub addr: Option<String>,

    /// Keep long-lock records after their lock is released
    #[arg(long = "keep-records")]
    pub keep_records: bool,

    /// Category for locks without one (overrides the config file)
    #[arg(long = "default-category", value_name = "NAME")]
    pub default_category: Option<String>,

    /// Wait threshold of the demo locks in milliseconds
    #[arg(long = "threshold-ms", value_name = "MS", default_value = "50")]
    pub threshold_ms: u64,

    /// Maximum number of concurrent demo workers
    #[arg(long = "max-workers", value_name = "N", default_value = "5")]
    pub max_workers: usize,

    /// Serve the monitor without running the demo workload
    #[arg(long = "no-workload")]
    pub no_workload: bool,

    /// Print category statistics on exit
    #[arg(short = 's', long = "summary")]
    pub summary: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `config`
    pub fn apply_overrides(&self, config: &mut MonitorConfig) {
        if let Some(addr) = &self.addr {
            config.http_server_addr.clone_from(addr);
        }
        if self.keep_records {
            config.keep_records = true;
        }
        if let Some(category) = &self.default_category {
            config.default_category.clone_from(category);
        }
    }
}
