//! Toolstream CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Single-message or interactive chat with abilities
//! - `abilities`: Print the schemas of the built-in abilities
//! - `config`: Print the default or the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolstream",
    about = "Toolstream — streaming chat agent with local abilities",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model
    Chat(commands::chat::ChatArgs),

    /// Print the built-in ability schemas as JSON
    Abilities,

    /// Print configuration
    Config {
        /// Show the effective configuration (file + environment) instead of defaults
        #[arg(long)]
        current: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries model output only
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat(args) => commands::chat::run(args).await?,
        Commands::Abilities => commands::abilities::run()?,
        Commands::Config { current } => commands::config_cmd::run(current)?,
    }

    Ok(())
}
