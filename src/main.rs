use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use panel_settings::config::{load_config, PanelConfig};
use panel_settings::lifecycle::{self, shutdown_signal};
use panel_settings::observability::logging;
use panel_settings::store::SettingsStore;

#[derive(Parser)]
#[command(name = "panel-settings")]
#[command(about = "Panel settings service", long_about = None)]
struct Args {
    /// Path to the TOML config file. Falls back to $PANEL_CONFIG, then defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var_os("PANEL_CONFIG").map(PathBuf::from));

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => PanelConfig::default(),
    };
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        data_dir = %config.paths.data_dir.display(),
        "panel-settings starting"
    );

    let store: Arc<dyn SettingsStore> = lifecycle::open_store(&config)?;
    let panel = lifecycle::launch(&config, store).await?;

    shutdown_signal().await;
    panel.server.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
