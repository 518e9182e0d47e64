//! Command-line interface for the `promptgate` binary.

mod ask;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use promptgate::config::Config;

pub(crate) use ask::cmd_ask;
pub(crate) use serve::cmd_serve;

#[derive(Parser, Debug)]
#[command(name = "promptgate")]
#[command(version)]
#[command(about = "Caching HTTP gateway for templated Gemini prompts", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the HTTP gateway
    Serve {
        #[command(flatten)]
        common: CommonArgs,
        /// Override the bind address
        #[arg(long)]
        bind: Option<String>,
        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Render one prompt, call the upstream once and print the result
    Ask {
        #[command(flatten)]
        common: CommonArgs,
        /// Template to use: ai, profile or future
        #[arg(long, default_value = "ai")]
        endpoint: String,
        /// User id inserted into the template
        #[arg(long)]
        user_id: Option<String>,
        /// Persona name override
        #[arg(long)]
        ai_name: Option<String>,
        /// Text to send
        text: String,
    },
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub(crate) struct CommonArgs {
    /// Path to a TOML config file
    #[arg(long, env = "PROMPTGATE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl CommonArgs {
    /// Load `.env`, initialise logging, then load the config.
    pub fn load(&self) -> Result<Config> {
        // `.env` may set RUST_LOG, so load it before the subscriber.
        let dotenv = dotenvy::dotenv();
        init_tracing(self.log_json);
        if let Ok(path) = dotenv {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Ok(Config::load(self.config.as_deref())?)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub(crate) fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing already initialised: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["promptgate", "serve", "--port", "9000", "--log-json"]).unwrap();
        match cli.command {
            Commands::Serve { common, port, bind } => {
                assert_eq!(port, Some(9000));
                assert!(bind.is_none());
                assert!(common.log_json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ask_defaults_to_ai() {
        let cli = Cli::try_parse_from(["promptgate", "ask", "hello"]).unwrap();
        match cli.command {
            Commands::Ask { endpoint, text, .. } => {
                assert_eq!(endpoint, "ai");
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
