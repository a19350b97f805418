use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use config::CodepadConfig;

#[derive(Parser)]
#[command(name = "codepad")]
#[command(about = "codepad - run code snippets locally, remotely or in simulation", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/codepad.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        file: PathBuf,

        #[arg(short, long)]
        lang: Option<String>,

        #[arg(long)]
        offline: bool,

        #[arg(long)]
        json: bool,
    },

    Languages,

    Contact {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        message: String,
    },

    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let succeeded = match cli.command {
        Commands::Run {
            file,
            lang,
            offline,
            json,
        } => {
            let config = CodepadConfig::load(cli.config.as_deref())?;
            commands::run::execute(file, lang, offline, json, config).await?
        }
        Commands::Languages => {
            commands::languages::execute();
            true
        }
        Commands::Contact {
            name,
            email,
            subject,
            message,
        } => {
            let config = CodepadConfig::load(cli.config.as_deref())?;
            commands::contact::execute(name, email, subject, message, config).await?
        }
        Commands::Version => {
            println!("codepad {}", env!("CARGO_PKG_VERSION"));
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
