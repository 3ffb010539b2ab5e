use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use shakes_domain::config::Config;
use shakes_gateway::api;
use shakes_gateway::state::AppState;

#[derive(Parser)]
#[command(name = "shakes", about = "AI request routing gateway for the Shakes marketing suite")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway server.
    Serve {
        /// Path to the TOML config file (defaults to ./shakes.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the provider catalog and which providers have credentials.
    Providers {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { config: None }) {
        Command::Serve { config } => serve(load_config(config)?).await,
        Command::Providers { config } => show_providers(load_config(config)?),
    }
}

/// Read the TOML config, falling back to built-in defaults when the file
/// does not exist.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = path.unwrap_or_else(|| PathBuf::from("shakes.toml"));
    if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Initialize structured JSON tracing for the server.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shakes_gateway=debug"));
    let fmt_layer = tracing_subscriber::fmt::layer().json();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    init_tracing();

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::from_config(config)?;

    tracing::info!("{}", state.registry.setup_message());

    tokio::spawn(state.queue.clone().run());
    tokio::spawn(state.monitor.clone().run());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "gateway listening");
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}

fn show_providers(config: Config) -> anyhow::Result<()> {
    let registry = shakes_providers::ProviderRegistry::from_config(&config.llm)?;
    println!("{}", registry.setup_message());
    for provider in registry.enabled_providers() {
        let limit = config.rate_limits.limit_for(provider.name);
        println!(
            "  {} (priority {}) - standard model {} - {}/min, {}/day",
            provider.name, provider.priority, provider.models.standard, limit.per_minute, limit.per_day
        );
    }
    Ok(())
}
