//! Tornado Cash withdrawal viewer CLI.
//!
//! Lists who received ETH from the Tornado Cash 1, 10 and 100 ETH pools in a
//! time window, using the Etherscan API.
//!
//! # Usage
//!
//! ```bash
//! # Interactive menus
//! tornado-viewer
//!
//! # Last 7 days, all pools
//! tornado-viewer --last-7d
//!
//! # 10 and 100 ETH pools over a custom range, exported to CSV
//! tornado-viewer --start-date 2024-01-01 --end-date 2024-01-31 -p 10,100 -e jan.csv
//!
//! # Replace the cached API key
//! tornado-viewer --reset-key
//! ```

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use tcview::{DateWindow, Pool};
use tcview_cli::config::{Config, DEFAULT_CONFIG_FILE};
use tcview_cli::credentials::CredentialStore;
use tcview_cli::interactive::run_menu;
use tcview_cli::prompt::Terminal;
use tcview_cli::run::{Query, Session, select_pools};
use tcview_cli::setup::{ExplorerValidator, ensure_api_key, reset_api_key};

/// Tornado Cash ETH pool withdrawal viewer.
#[derive(Debug, Parser)]
#[command(name = "tornado-viewer", version, about)]
#[command(group(
    ArgGroup::new("window")
        .args(["last_24h", "last_7d", "last_30d", "last_90d", "all_time", "start_date"])
        .multiple(false)
))]
#[allow(clippy::struct_excessive_bools, reason = "one flag per date window preset")]
struct Cli {
    /// Withdrawals from the last 24 hours.
    #[arg(long)]
    last_24h: bool,

    /// Withdrawals from the last 7 days.
    #[arg(long)]
    last_7d: bool,

    /// Withdrawals from the last 30 days.
    #[arg(long)]
    last_30d: bool,

    /// Withdrawals from the last 90 days.
    #[arg(long)]
    last_90d: bool,

    /// Every withdrawal since the pools were deployed. Slow.
    #[arg(long)]
    all_time: bool,

    /// First day of a custom range (YYYY-MM-DD).
    #[arg(long, value_parser = tcview::parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day of a custom range (YYYY-MM-DD); defaults to today.
    #[arg(long, value_parser = tcview::parse_date, requires = "start_date")]
    end_date: Option<NaiveDate>,

    /// Comma-separated pools to include: 1, 10, 100.
    #[arg(short, long, default_value = "1,10,100")]
    pools: String,

    /// Also write the table to this CSV file.
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Replace the cached Etherscan API key and exit.
    #[arg(long)]
    reset_key: bool,

    /// Print the monitored pools and exit.
    #[arg(long)]
    list_pools: bool,

    /// Runtime configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// API key cache file (default: `~/.tornado_viewer/config.json`).
    #[arg(long)]
    key_file: Option<PathBuf>,
}

impl Cli {
    /// The requested window, or `None` for interactive mode.
    const fn window(&self) -> Option<DateWindow> {
        if self.last_24h {
            Some(DateWindow::Last24Hours)
        } else if self.last_7d {
            Some(DateWindow::Last7Days)
        } else if self.last_30d {
            Some(DateWindow::Last30Days)
        } else if self.last_90d {
            Some(DateWindow::Last90Days)
        } else if self.all_time {
            Some(DateWindow::AllTime)
        } else if let Some(start) = self.start_date {
            Some(DateWindow::Range { start, end: self.end_date })
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the table.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_pools {
        cmd_list_pools();
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    let key_file = match cli.key_file.clone() {
        Some(path) => path,
        None => CredentialStore::default_path()?,
    };
    let store = CredentialStore::new(key_file);
    let validator = ExplorerValidator::new(config.explorer.clone());
    let mut terminal = Terminal;

    if cli.reset_key {
        reset_api_key(&mut terminal, &validator, &store).await?;
        return Ok(());
    }

    let api_key = ensure_api_key(&mut terminal, &validator, &store).await?;
    let mut session = Session {
        settings: config.explorer,
        store,
        api_key,
    };

    let Some(window) = cli.window() else {
        return run_menu(&mut session, &mut terminal, &validator).await;
    };

    let pools = select_pools(&mut terminal, &cli.pools)?;
    tracing::info!(pools = %pools, window = %window, "starting analysis");

    let query = Query {
        window,
        pools,
        export: cli.export,
    };
    session.run(&mut terminal, &query).await?;
    Ok(())
}

/// Execute `--list-pools`.
#[allow(clippy::print_stdout, reason = "pool listing is command output")]
fn cmd_list_pools() {
    println!("{:<8} {:<10} Address", "Token", "Pool");
    println!("{}", "-".repeat(62));

    for pool in Pool::ALL {
        println!(
            "{:<8} {:<10} {:#x}",
            pool.denomination(),
            pool.name(),
            pool.address()
        );
    }
}
