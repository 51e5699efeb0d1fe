use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use impact_support_lib::config::ServerConfig;
use impact_support_lib::{app_state, build_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "impact-support", version, about = "Impact Support System API server")]
struct Cli {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// SQLite database file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Seed demo services and tickets into an empty store.
    #[arg(long)]
    seed_demo: bool,

    /// Keep the store in memory; nothing is written to disk.
    #[arg(long)]
    in_memory: bool,
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;

    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if cli.seed_demo {
        config.seed_demo = true;
    }
    if cli.in_memory {
        config.in_memory = true;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("impact-support v{} starting", env!("CARGO_PKG_VERSION"));
    let addr = config.bind_addr;
    let state = app_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
