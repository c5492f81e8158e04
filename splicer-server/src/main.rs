//! # Splicer Server
//!
//! LTI 1.0/1.1 tool-consumer server.
//!
//! ## Overview
//!
//! Splicer launches external learning tools on behalf of an LMS and accepts
//! the score callbacks they post back:
//!
//! - **Launch**: OAuth 1.0 HMAC-SHA1 signed auto-submit forms for direct
//!   tools, redirects for PAWS-mediated tools
//! - **Outcome**: POX `replaceResultRequest` parsing, monotonic progress
//!   updates, UM-service forwarding, and a per-attempt audit log
//! - **Cache**: TTL-bound launch contexts in PostgreSQL, reaped hourly
//!
//! ## Architecture
//!
//! The server is built on Axum and uses PostgreSQL for the launch-context
//! cache, the outcome audit log, and module progress.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use splicer_core::application::LtiUnitOfWork;
use splicer_core::database::ports::LaunchCacheRepository;
use splicer_core::database::postgres::{self, PostgresLaunchCacheRepository};
use splicer_core::outcome::{ForwardingConfig, HttpUmForwarder, OutcomeProcessor};
use splicer_core::tools::ToolRegistry;

use splicer_server::config::Config;
use splicer_server::infra::{app_state::AppState, startup::spawn_cache_reaper};
use splicer_server::routes;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "splicer-server")]
#[command(about = "LTI tool-consumer server: signed launches and outcome processing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SPLICER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SPLICER_HOST")]
    host: Option<String>,

    /// PostgreSQL connection URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Run database preflight checks (connectivity + privileges) and exit
    Preflight,
    /// Apply database migrations and exit (runs preflight first)
    Migrate,
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Delete expired launch-context cache entries and exit
    Cleanup {
        /// Report how many entries would be deleted without deleting them
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap parses so `env`-sourced arguments see it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(command) = cli.command {
        match command {
            Command::Db(DbCommand::Preflight) => {
                run_db_preflight(&cli.serve).await?;
                return Ok(());
            }
            Command::Db(DbCommand::Migrate) => {
                run_db_migrate(&cli.serve).await?;
                return Ok(());
            }
            Command::Cache(CacheCommand::Cleanup { dry_run }) => {
                run_cache_cleanup(&cli.serve, dry_run).await?;
                return Ok(());
            }
        }
    }

    run_server(&cli.serve).await
}

fn load_config(args: &ServeArgs) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.host = host;
    }
    if let Some(database_url) = args.database_url.clone() {
        config.database_url = Some(database_url);
    }

    Ok(config)
}

async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;

    if !(database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")) {
        anyhow::bail!("Invalid database URL: must start with postgres:// or postgresql://");
    }

    let pool = postgres::connect(database_url, config.database_max_connections)
        .await
        .context("failed to connect to PostgreSQL")?;
    Ok(pool)
}

async fn run_db_preflight(args: &ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let pool = connect_pool(&config).await?;
    postgres::preflight(&pool)
        .await
        .context("database preflight failed")?;
    info!("Database preflight passed");
    Ok(())
}

async fn run_db_migrate(args: &ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let pool = connect_pool(&config).await?;
    postgres::preflight(&pool)
        .await
        .context("database preflight failed")?;
    postgres::run_migrations(&pool)
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

async fn run_cache_cleanup(args: &ServeArgs, dry_run: bool) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let pool = connect_pool(&config).await?;
    let cache = PostgresLaunchCacheRepository::new(pool);
    let now = Utc::now();

    if dry_run {
        let count = cache.count_expired(now).await?;
        println!("Would delete {count} expired cache entries.");
        return Ok(());
    }

    let deleted = cache.delete_expired(now).await?;
    println!("Successfully cleaned up {deleted} expired cache entries.");
    Ok(())
}

async fn run_server(args: &ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let pool = connect_pool(&config).await?;

    postgres::run_migrations(&pool)
        .await
        .context("database migration failed")?;

    let registry = Arc::new(ToolRegistry::from_env());
    info!(tools = ?registry.list_configured(), "tool registry loaded");
    if !config.forward_to_um {
        warn!("UM forwarding is disabled; outcomes only update local progress");
    }

    let uow = LtiUnitOfWork::from_postgres(pool);
    let forwarder =
        Arc::new(HttpUmForwarder::new().context("failed to build the UM forwarding client")?);
    let processor = Arc::new(OutcomeProcessor::new(
        uow.clone(),
        registry.clone(),
        forwarder,
        ForwardingConfig {
            enabled: config.forward_to_um,
            um_service_url: config.um_service_url.clone(),
        },
    ));

    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), registry, uow, processor);
    spawn_cache_reaper(&state);

    let router = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting Splicer LTI server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router).await?;

    Ok(())
}
