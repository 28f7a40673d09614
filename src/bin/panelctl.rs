use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use panel_settings::config::{load_config, PanelConfig};
use panel_settings::net::OfflineControl;
use panel_settings::settings::{seed_defaults, TerminalInfo};
use panel_settings::store::{FileStore, SettingsStore};
use panel_settings::SettingsService;

#[derive(Parser)]
#[command(name = "panelctl")]
#[command(about = "Local recovery CLI for the panel settings", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print all settings (secrets blanked)
    Show,
    /// Update one setting; listener changes apply on next start
    Set { key: String, value: String },
    /// Describe the installed panel certificate
    CertInfo,
    /// List host addresses the panel can bind to
    Interfaces,
    /// Print the web terminal settings
    Terminal,
    /// Replace the web terminal settings from a JSON document
    SetTerminal { json: String },
    /// Disable MFA for the panel account
    ResetMfa,
    /// Replace the panel password without the old one
    ResetPassword { password: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PanelConfig::default(),
    };

    let store: Arc<dyn SettingsStore> = Arc::new(FileStore::open(config.paths.settings_file())?);
    seed_defaults(store.as_ref(), &config)?;
    let service = SettingsService::new(
        &config,
        store,
        Arc::new(OfflineControl::new(config.server.tls_enabled)),
    );

    match cli.command {
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&service.setting_info()?)?);
        }
        Commands::Set { key, value } => {
            service.update(&key, &value).await?;
            println!("{key} updated");
        }
        Commands::CertInfo => {
            println!("{}", serde_json::to_string_pretty(&service.describe_certificate()?)?);
        }
        Commands::Interfaces => {
            for addr in service.interface_addresses()? {
                println!("{:<12} {}", addr.interface, addr.address);
            }
        }
        Commands::Terminal => {
            println!("{}", serde_json::to_string_pretty(&service.terminal_info()?)?);
        }
        Commands::SetTerminal { json } => {
            service.update_terminal(json.parse::<TerminalInfo>()?)?;
            println!("Terminal settings updated");
        }
        Commands::ResetMfa => {
            service.unbind_mfa()?;
            println!("MFA disabled");
        }
        Commands::ResetPassword { password } => {
            service.passwords().reset(&password).await?;
            println!("Password reset");
        }
    }

    Ok(())
}
