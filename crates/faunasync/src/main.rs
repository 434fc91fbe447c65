//! Faunasync command-line entry point
//!
//! Thin shell over the engine: loads the site configuration, wires the HTTP
//! transport to the file-backed store, and dispatches one subcommand per
//! sync operation. Commands run to completion and exit; scheduling cadence
//! is left to cron or a systemd timer.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use faunasync_client::{
    Catalog, GroupId, HttpTransport, TAXO_GROUPS, TERRITORIAL_UNITS,
};
use faunasync_engine::{fetch_all, Runner, SyncStrategy};
use faunasync_store::{JsonFileStore, Storage};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

mod config;

use config::SyncConfig;

#[derive(Parser, Debug)]
#[command(name = "faunasync", about = "Incremental mirror of a remote wildlife observation service")]
struct Cli {
    /// Path to the site configuration file
    #[arg(short, long, env = "FAUNASYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a configuration template to the given path
    Init {
        /// Where to write the template
        path: PathBuf,
    },

    /// List the remote catalog's logical groups and their access
    Groups,

    /// Full refresh: sweep every eligible group window by window
    FullScan {
        /// Restrict to one group, by name
        #[arg(long)]
        group: Option<String>,

        /// Override the oldest date to reach back to (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Override the newest date to start from (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },

    /// Differential sync: apply remote changes since each group's checkpoint
    Update {
        /// Ignore checkpoints and sync changes since this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Download the reference tables (taxo groups, territorial units)
    Tables,
}

fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".faunasync")
        .join("faunasync.toml")
}

fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    SyncConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Groups => {
            let config = load_config(&cli)?;
            cmd_groups(&config)
        }
        Commands::FullScan {
            ref group,
            start_date,
            end_date,
        } => {
            let config = load_config(&cli)?;
            cmd_full_scan(&config, group.as_deref(), start_date, end_date)
        }
        Commands::Update { since } => {
            let config = load_config(&cli)?;
            cmd_update(&config, since)
        }
        Commands::Tables => {
            let config = load_config(&cli)?;
            cmd_tables(&config)
        }
    }
}

fn cmd_init(path: &PathBuf) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists, not overwriting", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let template = SyncConfig {
        site: "mysite".to_string(),
        base_url: "https://www.example.org/api/".to_string(),
        user_email: "user@example.org".to_string(),
        user_pw: "CHANGE_ME".to_string(),
        client_key: "CHANGE_ME".to_string(),
        store_root: default_config_path()
            .parent()
            .map(|p| p.join("store"))
            .unwrap_or_else(|| PathBuf::from("store")),
        max_retry: 5,
        tuning: Default::default(),
        filter: Default::default(),
    };
    template.save(path)?;
    info!(path = %path.display(), "Wrote configuration template");
    println!("Template written to {}. Fill in the credentials before running.", path.display());
    Ok(())
}

fn cmd_groups(config: &SyncConfig) -> Result<()> {
    let transport = HttpTransport::new(config.transport_config())?;
    let groups = transport.list_groups()?;
    for group in &groups {
        println!("{:>6}  {:<30}  {}", group.id, group.name, group.access);
    }
    println!("{} groups", groups.len());
    Ok(())
}

fn cmd_full_scan(
    config: &SyncConfig,
    only: Option<&str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    let transport = HttpTransport::new(config.transport_config())?;
    let store = JsonFileStore::open(&config.store_root)?;
    let runner = Runner::new(&transport, &store, &store, config.engine_tuning())
        .with_exclusions(config.filter.taxo_exclude.clone());

    let mut groups = transport.list_groups()?;
    if let Some(name) = only {
        groups.retain(|g| g.name == name || g.id.as_str() == name);
        if groups.is_empty() {
            anyhow::bail!("no group named '{}' in the remote catalog", name);
        }
    }

    let mut bounds = config.scan_bounds();
    if let Some(date) = start_date {
        bounds.floor_date = Some(midnight(date));
    }
    if let Some(date) = end_date {
        bounds.end_date = Some(midnight(date));
    }

    let strategy = SyncStrategy::Search {
        sub_filters: config.sub_filters(),
    };

    info!(site = %config.site, groups = groups.len(), "Starting full scan");
    let started = Utc::now();
    let report = runner.full_scan(&groups, &strategy, &bounds);
    info!(
        site = %config.site,
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_secs = (Utc::now() - started).num_seconds(),
        "Full scan finished"
    );

    if report.failed > 0 {
        anyhow::bail!("{} group(s) failed, see log for details", report.failed);
    }
    Ok(())
}

fn cmd_update(config: &SyncConfig, since: Option<NaiveDate>) -> Result<()> {
    let transport = HttpTransport::new(config.transport_config())?;
    let store = JsonFileStore::open(&config.store_root)?;
    let runner = Runner::new(&transport, &store, &store, config.engine_tuning())
        .with_exclusions(config.filter.taxo_exclude.clone());

    let groups = transport.list_groups()?;
    info!(site = %config.site, groups = groups.len(), "Starting differential sync");
    let report = runner.update(&groups, since.map(midnight));
    info!(
        site = %config.site,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Differential sync finished"
    );

    if report.skipped > 0 {
        warn!(
            skipped = report.skipped,
            "Some groups have no checkpoint yet, run full-scan first"
        );
    }
    if report.failed > 0 {
        anyhow::bail!("{} group(s) failed, see log for details", report.failed);
    }
    Ok(())
}

/// Reference tables have no time axis: one plain paginated download each,
/// stored under the table name.
fn cmd_tables(config: &SyncConfig) -> Result<()> {
    let transport = HttpTransport::new(config.transport_config())?;
    let store = JsonFileStore::open(&config.store_root)?;
    let tuning = config.engine_tuning();

    for table in [TAXO_GROUPS, TERRITORIAL_UNITS] {
        let key = GroupId::from(table);
        let query = faunasync_client::Query::new();
        let count = fetch_all(&transport, table, &query, &tuning, |page| {
            store.store(&key, table, &page.items)?;
            Ok(())
        })?;
        info!(table, count, "Reference table downloaded");
    }
    Ok(())
}

fn midnight(date: NaiveDate) -> chrono::DateTime<Utc> {
    chrono::DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "faunasync=debug,faunasync_engine=debug,faunasync_client=debug,faunasync_store=debug"
    } else {
        "faunasync=info,faunasync_engine=info,faunasync_client=info,faunasync_store=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
