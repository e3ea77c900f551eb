//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CredentialOverrides;

/// mihari - search your Gmail from the terminal
#[derive(Debug, Parser)]
#[command(name = "mihari")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "MIHARI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// OAuth client flags shared by the commands that talk to Google.
#[derive(Debug, Clone, Default, Args)]
pub struct ClientArgs {
    /// OAuth client ID (from Google Cloud Console)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (confidential "web" clients only)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Path to a Google Cloud Console credentials JSON file
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,
}

impl From<ClientArgs> for CredentialOverrides {
    fn from(args: ClientArgs) -> Self {
        Self {
            client_id: args.client_id,
            client_secret: args.client_secret,
            credentials_file: args.credentials_file,
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Link a Gmail account through the browser
    Link {
        /// User id to link; a new one is generated when omitted
        #[arg(long, short)]
        user: Option<String>,

        /// Replace an existing link for this user
        #[arg(long, short)]
        force: bool,

        /// Print the consent URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Search the linked mailbox
    Search {
        /// User id (defaults to `default_user` from the config)
        #[arg(long, short)]
        user: Option<String>,

        /// Maximum number of results (1-500)
        #[arg(long, short = 'n', value_parser = clap::value_parser!(u32).range(1..=500))]
        max: Option<u32>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Gmail search query, e.g. `from:billing invoice`
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Print a fresh access token for a linked user
    Token {
        /// User id (defaults to `default_user` from the config)
        #[arg(long, short)]
        user: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Forget the stored credential of a user
    Unlink {
        /// User id (defaults to `default_user` from the config)
        #[arg(long, short)]
        user: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration and data file paths
    Path,
}
