use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use urlwatch::config::Config;
use urlwatch::database::models::{NewTarget, TargetUpdate};
use urlwatch::database::{LibsqlStore, initialize_database};
use urlwatch::engine::MonitorEngine;
use urlwatch::monitoring::ledger::DEFAULT_PAGE_LIMIT;
use urlwatch::monitoring::{MonitoringScheduler, PageRequest, ProbeExecutor, StatsPeriod};
use urlwatch::pool::open_pool;

#[derive(Parser, Debug)]
#[command(name = "urlwatch", version, about = "Endpoint reachability monitoring")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "URLWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Owner the command acts on behalf of
    #[arg(long, env = "URLWATCH_OWNER", default_value = "local", global = true)]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep every target on the configured tick until ctrl-c
    Run,
    /// Register a target and run its initial check
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
        /// Check interval in minutes
        #[arg(long)]
        interval: Option<u32>,
    },
    /// List the owner's targets
    List,
    Show { id: Uuid },
    /// Change a target's display name or interval
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Delete a target and its history
    Remove { id: Uuid },
    /// Probe a target now
    Test { id: Uuid },
    History {
        id: Uuid,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
    /// Uptime statistics over 24h, 7d or 30d
    Stats {
        id: Uuid,
        #[arg(long, default_value = "24h")]
        period: String,
    },
    /// Print the effective configuration
    Config,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_engine(config: &Config) -> Result<MonitorEngine> {
    let pool = open_pool(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    let conn = pool.get().await.map_err(|e| anyhow!("Failed to get connection: {e}"))?;
    initialize_database(&conn).await.context("Failed to initialize database")?;
    drop(conn);

    let store = Arc::new(LibsqlStore::new_from_pool(pool, config.monitoring.history_capacity));
    let executor = Arc::new(
        ProbeExecutor::new(config.monitoring.probe_timeout_ms, &config.monitoring.user_agent)
            .context("Failed to build probe executor")?,
    );

    Ok(MonitorEngine::new(store, executor))
}

async fn run_scheduler(config: &Config, engine: &MonitorEngine) -> Result<()> {
    let scheduler = MonitoringScheduler::new(
        engine.store(),
        engine.executor(),
        Duration::from_secs(config.monitoring.tick_seconds),
        config.monitoring.max_concurrent_probes,
    );

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested, finishing current sweep");
        })
        .await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Command::Config = cli.command {
        print!("{config}");
        return Ok(());
    }

    let engine = build_engine(&config).await?;
    let owner = cli.owner.as_str();

    match cli.command {
        Command::Run => run_scheduler(&config, &engine).await?,
        Command::Add { url, name, interval } => {
            let input = NewTarget { address: url, display_name: name, check_interval_minutes: interval };
            print_json(&engine.register(owner, input).await?)?;
        }
        Command::List => print_json(&engine.list_targets(owner).await?)?,
        Command::Show { id } => print_json(&engine.get_target(owner, id).await?)?,
        Command::Update { id, name, interval } => {
            let update = TargetUpdate { display_name: name, check_interval_minutes: interval };
            print_json(&engine.update_target(owner, id, update).await?)?;
        }
        Command::Remove { id } => {
            engine.delete_target(owner, id).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Command::Test { id } => print_json(&engine.manual_test(owner, id).await?)?,
        Command::History { id, page, limit } => {
            print_json(&engine.history(owner, id, PageRequest::new(page, limit)).await?)?;
        }
        Command::Stats { id, period } => {
            print_json(&engine.stats(owner, id, StatsPeriod::parse_lossy(&period)).await?)?;
        }
        Command::Config => {}
    }

    Ok(())
}
