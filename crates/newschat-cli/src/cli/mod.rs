//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use newschat_core::config::{self, Config};

mod commands;

#[derive(Parser)]
#[command(name = "newschat")]
#[command(version)]
#[command(about = "Multi-user terminal news reader and chat server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: $NEWSCHAT_HOME/config.toml)
    #[arg(long, global = true, env = "NEWSCHAT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    serve: ServeArgs,
}

/// Listener overrides for the serve command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "NEWSCHAT_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "NEWSCHAT_PORT")]
    pub port: Option<u16>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the server (default)
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Write a default config file (if not present)
    Init,
    /// Print the default config
    Generate,
}

pub fn run() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::paths::config_path);

    match cli.command {
        None => serve(&config_path, &cli.serve).await,
        Some(Commands::Serve { args }) => {
            let merged = ServeArgs {
                host: args.host.or(cli.serve.host),
                port: args.port.or(cli.serve.port),
            };
            serve(&config_path, &merged).await
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => {
                commands::config::path(&config_path);
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(&config_path),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}

async fn serve(config_path: &std::path::Path, args: &ServeArgs) -> Result<()> {
    let config = Config::load_from(config_path).context("load config")?;
    commands::serve::run(config, args).await
}
