use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use manatan_config::Settings;
use manatan_config::storage::{JsonFileStore, SettingsStore, default_store_path};
use manatan_io::HostBridge;
use tracing_subscriber::EnvFilter;

mod commands;
mod controller;
mod events;
mod state;


use self::controller::AppController;
use self::state::AppState;

#[derive(Parser)]
#[command(name = "manatan", about = "OCR overlay engine for manga readers")]
#[command(version)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Settings store (defaults to the data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the host bridge (default)
    Run {
        /// Override the bridge listen address
        #[arg(long)]
        bridge_addr: Option<String>,
    },
    /// Drop cached OCR results on the server
    PurgeCache,
    /// Manage dictionaries on the server
    Yomitan {
        #[command(subcommand)]
        action: commands::YomitanAction,
    },
    /// AnkiConnect diagnostics
    Anki {
        #[command(subcommand)]
        action: commands::AnkiAction,
    },
    /// Inspect or reset stored settings
    Settings {
        #[command(subcommand)]
        action: commands::SettingsAction,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn open_settings(path: Option<PathBuf>) -> anyhow::Result<SettingsStore<JsonFileStore>> {
    let path = path.unwrap_or_else(default_store_path);
    let store = JsonFileStore::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(SettingsStore::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut settings_store = open_settings(cli.store)?;
    let settings = settings_store.load().with_env_overrides();

    match cli.command.unwrap_or(Command::Run { bridge_addr: None }) {
        Command::Run { bridge_addr } => {
            if !settings_store.is_setup_complete() {
                tracing::warn!("Setup not completed, run `manatan yomitan install-defaults` first");
            }
            run(settings, bridge_addr).await
        }
        Command::PurgeCache => commands::purge_cache(&settings).await,
        Command::Yomitan { action } => commands::yomitan(&settings, &mut settings_store, action).await,
        Command::Anki { action } => commands::anki(&settings, action).await,
        Command::Settings { action } => commands::settings(&settings, &mut settings_store, action),
    }
}

async fn run(mut settings: Settings, bridge_addr: Option<String>) -> anyhow::Result<()> {
    if let Some(addr) = bridge_addr {
        settings.bridge_addr = addr;
    }

    let bridge = HostBridge::bind(&settings.bridge_addr)
        .await
        .with_context(|| format!("failed to bind host bridge on {}", settings.bridge_addr))?;

    tracing::info!(
        "OCR server {}, language {}, Anki {}",
        settings.server.base_url,
        settings.server.language,
        if settings.anki.enabled { "enabled" } else { "disabled" }
    );

    let state = Arc::new(AppState::new(settings)?);
    let controller = AppController::new(state);
    let mut tasks = controller.spawn_tasks(bridge);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Ok(())) => tracing::warn!("A task exited"),
                Ok(Err(e)) => tracing::error!("A task failed: {e:#}"),
                Err(e) => tracing::error!("A task panicked: {e}"),
            }
        }
    }

    controller.shutdown();
    while tasks.join_next().await.is_some() {}

    Ok(())
}
