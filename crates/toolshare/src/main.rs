use clap::Parser;
use eyre::Result;

use toolshare::cli::{Cli, Commands, PreferencesCommands, StoreCommands};
use toolshare::commands::{
    Command,
    preferences::{PreferencesAction, PreferencesCommand},
    shell::ShellCommand,
    store::{StoreAction, StoreCommand},
};
use toolshare::settings::{Overrides, Settings};
use toolshare_core::preferences::Preferences;

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    // Load .env first so TOOLSHARE_STORE_DIR can come from it
    toolshare::cli::config::load_env()?;

    let cli = Cli::parse();

    // Initialize tracing (level configured via RUST_LOG env var)
    toolshare_core::utils::tracing::init_tracing()?;

    let preferences = Preferences::load().unwrap_or_default();
    let overrides = Overrides::from(&cli);

    match cli.command.unwrap_or_default() {
        Commands::Shell { instances } => {
            let settings = Settings::resolve(&overrides, &preferences)?;
            ShellCommand {
                instances,
                settings,
            }
            .execute()
            .await
        }
        Commands::Store { action } => {
            let settings = Settings::resolve(&overrides, &preferences)?;
            let action = match action {
                StoreCommands::List => StoreAction::List,
                StoreCommands::Get { key } => StoreAction::Get { key },
                StoreCommands::Delete { key } => StoreAction::Delete { key },
            };
            StoreCommand { action, settings }.execute().await
        }
        Commands::Preferences { action } => {
            let action = match action {
                PreferencesCommands::Show => PreferencesAction::Show,
                PreferencesCommands::Reset => PreferencesAction::Reset,
            };
            PreferencesCommand {
                action,
                path: Preferences::config_path()?,
            }
            .execute()
            .await
        }
    }
}
