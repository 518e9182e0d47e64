//! PromptGate binary entry point.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { common, bind, port } => cli::cmd_serve(common, bind, port).await,
        Commands::Ask {
            common,
            endpoint,
            user_id,
            ai_name,
            text,
        } => cli::cmd_ask(common, endpoint, user_id, ai_name, text).await,
    }
}
