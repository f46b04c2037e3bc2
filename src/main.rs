use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cardsmith::config::{AppConfig, DEFAULT_CONFIG_FILE};
use cardsmith::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "cardsmith")]
#[command(
    version,
    about = "Turns Trello cards assigned to a bot into AI-authored GitHub pull requests"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (missing file means defaults + environment)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook gateway
    Serve {
        /// Bind host (overrides [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply a saved model response to a local file
    Apply {
        /// File to patch
        #[arg(long)]
        file: PathBuf,

        /// File holding the raw model response
        #[arg(long)]
        proposal: PathBuf,

        /// Write the patched content back to --file instead of printing it
        #[arg(long)]
        write: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration with secrets redacted
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; variables may come from the process environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_format, cli.log_dir.as_deref())?;

    match &cli.command {
        Commands::Serve { host, port } => {
            let config = AppConfig::load_layered(&cli.config)?;
            cmd::cmd_serve(config, host.clone(), *port).await?;
        }
        Commands::Apply {
            file,
            proposal,
            write,
        } => cmd::cmd_apply(file, proposal, *write)?,
        Commands::Config { command } => {
            let config = AppConfig::load_layered(&cli.config)?;
            cmd::cmd_config(&cli.config, &config, command.clone())?;
        }
    }

    Ok(())
}
