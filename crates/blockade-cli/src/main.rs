//! blockadectl - manage what blockade blocks
//!
//! Reads and writes the policy store shared with blockaded. The service picks
//! up every change on its next cycle.

mod apps;

use anyhow::{Context, Result, bail};
use blockade_api::Schedule;
use blockade_config::{Config, load_config, load_config_or_default};
use blockade_host_api::AppRegistry;
use blockade_host_linux::DesktopEntryRegistry;
use blockade_store::{PolicyStore, SqliteStore};
use blockade_util::{
    MinuteOfDay, PackageId, config_path_without_env, database_path, format_datetime_full,
    format_duration,
};
use clap::{Parser, Subcommand};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blockadectl")]
#[command(about = "Manage the apps blockade interrupts", long_about = None)]
struct Cli {
    /// Configuration file path (default: ~/.config/blockade/config.toml)
    #[arg(short, long, global = true, env = "BLOCKADE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override (or set BLOCKADE_DATA_DIR env var)
    #[arg(short, long, global = true, env = "BLOCKADE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show whether blocking is on and active right now
    Status,

    /// List the blocked apps
    List,

    /// Add apps to the blocked set
    Block {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Remove apps from the blocked set
    Unblock {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Replace the blocked set (no packages clears it)
    SetBlocked { packages: Vec<String> },

    /// Turn blocking on
    Enable,

    /// Turn blocking off
    Disable,

    /// Show or change the daily blocking window
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// List installed apps, grouped alphabetically
    Apps {
        /// Only show apps whose name or package contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show recent audit records
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ScheduleAction {
    /// Show the current window
    Show,

    /// Block only between START and END each day (HH:MM, may cross midnight)
    Set { start: String, end: String },

    /// Block at all times of day
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            let path = config_path_without_env();
            load_config_or_default(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))
        }
    }
}

fn open_store(data_dir: Option<&PathBuf>, config: &Config) -> Result<SqliteStore> {
    let data_dir = data_dir.unwrap_or(&config.service.data_dir);
    let db_path = database_path(data_dir);

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    debug!(db_path = %db_path.display(), "Opened policy store");
    Ok(store.with_reserved(config.reserved()))
}

fn parse_packages(packages: &[String]) -> Result<Vec<PackageId>> {
    packages
        .iter()
        .map(|p| PackageId::parse(p).map_err(Into::into))
        .collect()
}

fn run(cli: Cli) -> Result<()> {
    let config = load(&cli)?;
    let store = || open_store(cli.data_dir.as_ref(), &config);

    match cli.command {
        Commands::Status => cmd_status(&store()?),
        Commands::List => cmd_list(&store()?),
        Commands::Apps { search } => cmd_apps(search.as_deref()),
        Commands::Block { packages } => {
            let store = store()?;
            for package in parse_packages(&packages)? {
                if store.add_blocked(&package)? {
                    println!("Blocked {}", package);
                } else {
                    println!("{} was already blocked", package);
                }
            }
            Ok(())
        }
        Commands::Unblock { packages } => {
            let store = store()?;
            for package in parse_packages(&packages)? {
                if store.remove_blocked(&package)? {
                    println!("Unblocked {}", package);
                } else {
                    println!("{} was not blocked", package);
                }
            }
            Ok(())
        }
        Commands::SetBlocked { packages } => {
            let packages: BTreeSet<PackageId> = parse_packages(&packages)?.into_iter().collect();
            store()?.set_blocked(&packages)?;
            println!("Blocked set now has {} apps", packages.len());
            Ok(())
        }
        Commands::Enable => {
            store()?.set_enabled(true)?;
            println!("Blocking enabled");
            Ok(())
        }
        Commands::Disable => {
            store()?.set_enabled(false)?;
            println!("Blocking disabled");
            Ok(())
        }
        Commands::Schedule { action } => cmd_schedule(&store()?, action),
        Commands::Audit { limit } => {
            for record in store()?.get_recent_audits(limit)? {
                println!(
                    "{}  {}",
                    format_datetime_full(&record.timestamp),
                    record.event.summary()
                );
            }
            Ok(())
        }
    }
}

fn cmd_status(store: &SqliteStore) -> Result<()> {
    let policy = store.get_policy()?;
    let now = blockade_util::now();

    println!("=== Blockade Status ===\n");
    println!(
        "Blocking:  {}",
        if policy.enabled { "ENABLED" } else { "DISABLED" }
    );
    println!("Schedule:  {}", policy.schedule);

    let active = policy.is_active_at(&now);
    println!("Active:    {}", if active { "YES" } else { "NO" });

    if active
        && let Some(remaining) = policy
            .schedule
            .window()
            .and_then(|window| window.remaining_duration(&now))
    {
        println!("Ends in:   {}", format_duration(remaining));
    }

    println!("\nBlocked apps: {}", policy.blocked_packages.len());
    Ok(())
}

fn cmd_list(store: &SqliteStore) -> Result<()> {
    let blocked = store.list_blocked()?;
    if blocked.is_empty() {
        println!("No apps are blocked");
        return Ok(());
    }

    let labels: HashMap<PackageId, String> = DesktopEntryRegistry::from_env()
        .installed_apps()
        .unwrap_or_default()
        .into_iter()
        .map(|app| (app.package, app.label))
        .collect();

    for app in blocked {
        let label = labels.get(&app.package).map(String::as_str).unwrap_or("-");
        println!(
            "{:<24} {:<40} added {}",
            label,
            app.package,
            app.added_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn cmd_schedule(store: &SqliteStore, action: ScheduleAction) -> Result<()> {
    match action {
        ScheduleAction::Show => {
            let policy = store.get_policy()?;
            println!("{}", policy.schedule);
        }
        ScheduleAction::Set { start, end } => {
            let start: MinuteOfDay = start.parse()?;
            let end: MinuteOfDay = end.parse()?;
            let schedule = Schedule::daily(start, end);
            store.set_schedule(schedule)?;
            println!("Schedule set to {}", schedule);
        }
        ScheduleAction::Clear => {
            store.set_schedule(Schedule::Always)?;
            println!("Schedule cleared, blocking at all times");
        }
    }
    Ok(())
}

fn cmd_apps(search: Option<&str>) -> Result<()> {
    let installed = DesktopEntryRegistry::from_env()
        .installed_apps()
        .context("Failed to list installed apps")?;

    let matching = apps::filter_apps(&installed, search);
    if matching.is_empty() {
        match search {
            Some(query) => bail!("No installed apps match {:?}", query),
            None => bail!("No installed apps found"),
        }
    }

    for (section, group) in apps::sections(matching) {
        println!("{}", section);
        for app in group {
            println!("  {:<32} {}", app.label, app.package);
        }
    }
    Ok(())
}
