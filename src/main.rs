use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tap_economy::{
    repositories::{memory::MemoryStore, postgres::PgStore, Store},
    services,
    settings::{Backend, Settings},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `server.listen` from the config file.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let settings = Settings::load(&args.config).context("Failed to load settings")?;

    init_logging(&args.log4rs)?;
    log::info!("Starting tap economy service.");

    let store = open_store(&settings).await?;
    let state = services::start_services(store, &settings).await?;

    let listen = args.listen.unwrap_or_else(|| settings.server.listen.clone());
    services::http::start_http_server(state, &listen).await?;

    Ok(())
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    match settings.storage.backend {
        Backend::Memory => {
            log::warn!("Using the in-memory store, balances will not survive a restart.");
            Ok(Arc::new(MemoryStore::with_default_config()))
        }
        Backend::Postgres => {
            let postgres = settings
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("[postgres] section is required"))?;

            let mut options = PgPoolOptions::new().max_connections(postgres.max_connections);
            if let Some(secs) = postgres.acquire_timeout_secs {
                options = options.acquire_timeout(Duration::from_secs(secs));
            }

            let pool = options.connect(&postgres.url).await?;
            log::info!("Connected to database.");

            if postgres.run_migrations {
                sqlx::migrate!("./migrations").run(&pool).await?;
                log::info!("Migrations applied.");
            }

            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
