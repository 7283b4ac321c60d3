use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docrest::auth::{AuthError, Authenticator};
use docrest::config::AppConfig;
use docrest::database::{DocumentStore, MemoryStore, PgStore};
use docrest::samples;
use docrest::Server;

#[derive(Parser)]
#[command(name = "docrest")]
#[command(about = "Serves the sample payments and universe resources over HTTP")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Port to listen on (overrides API_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Keep documents in memory even when a database URL is configured")]
    memory: bool,

    #[arg(long, help = "Postgres server URL (overrides DATABASE_URL)")]
    database_url: Option<String>,

    #[arg(long, env = "DOCREST_SEED_API_KEY", default_value = samples::SAMPLE_API_KEY)]
    seed_api_key: String,

    #[arg(long, help = "Log at debug level unless RUST_LOG says otherwise")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends can live there
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if cli.database_url.is_some() {
        config.database.url = cli.database_url.clone();
    }

    let mut settings = samples::settings();
    settings.debug = cli.debug;
    settings.global.list_max_results = config.api.list_max_results;

    let default_level = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
    info!("Starting docrest in {:?} mode", config.environment);

    let store: Arc<dyn DocumentStore> = match (&config.database.url, cli.memory) {
        (Some(url), false) => {
            info!("Using the Postgres store");
            let store = PgStore::new(url, config.database.max_connections, config.database.connection_timeout())
                .context("invalid database configuration")?;
            Arc::new(store)
        }
        _ => {
            info!("Using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let auth = settings.auth.clone();
    let server = Server::assemble(settings, store.clone(), samples::validator(), &config)
        .await
        .context("failed to assemble the server")?;

    let authenticator = Authenticator::new(store.collection(&auth.database, &auth.collection));
    match authenticator.register(&samples::token(&cli.seed_api_key)).await {
        Ok(id) => info!("Seeded sample api key as {}", id),
        Err(AuthError::Store(e)) if e.is_duplicate_key() => info!("Sample api key already present"),
        Err(e) => return Err(e).context("failed to seed the sample api key"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    server.run(addr).await?;
    Ok(())
}
