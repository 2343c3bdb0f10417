use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toolshare_core::notify::TransportKind;

pub const DEFAULT_INSTANCES: usize = 2;

/// Run several toolshare instances against one store and watch their state
/// stay in sync.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Directory of the durable store (defaults to the platform data directory)
    #[arg(long, env = "TOOLSHARE_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Storage quota in bytes shared by all keys; 0 disables the limit
    #[arg(long, global = true)]
    pub quota_bytes: Option<u64>,

    /// Where notifications go: auto, osc9, desktop, log or off
    #[arg(long, value_name = "TRANSPORT", global = true)]
    pub notifications: Option<TransportKind>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Attach instances to one origin and read tool commands from stdin (default)
    Shell {
        /// Number of instances to attach
        #[arg(long, default_value_t = DEFAULT_INSTANCES)]
        instances: usize,
    },
    /// Inspect the durable store
    Store {
        #[command(subcommand)]
        action: StoreCommands,
    },
    /// Manage user preferences
    Preferences {
        #[command(subcommand)]
        action: PreferencesCommands,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Shell {
            instances: DEFAULT_INSTANCES,
        }
    }
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum StoreCommands {
    /// List stored keys
    List,
    /// Print the document stored under a key
    Get {
        /// Key to read
        key: String,
    },
    /// Delete the document stored under a key
    Delete {
        /// Key to delete
        key: String,
    },
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum PreferencesCommands {
    /// Show current preferences
    Show,
    /// Reset preferences to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_shell() {
        let cli = Cli::try_parse_from(["toolshare"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Commands::default());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "toolshare",
            "store",
            "get",
            "memo_text",
            "--store-dir",
            "/tmp/toolshare",
            "--notifications",
            "off",
        ])
        .unwrap();

        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/toolshare")));
        assert_eq!(cli.notifications, Some(TransportKind::Off));
        assert_eq!(
            cli.command,
            Some(Commands::Store {
                action: StoreCommands::Get {
                    key: "memo_text".to_string()
                }
            })
        );
    }

    #[test]
    fn unknown_transport_is_rejected() {
        assert!(Cli::try_parse_from(["toolshare", "--notifications", "pager"]).is_err());
    }

    #[test]
    fn shell_instances_flag() {
        let cli = Cli::try_parse_from(["toolshare", "shell", "--instances", "3"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Shell { instances: 3 }));
    }
}
