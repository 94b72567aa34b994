use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ims::config::{load_config, AppConfig, LogConfig};
use ims::personnel::hash_password;
use ims::server::run_http_server;

/// IMS: incident management JSON API server
#[derive(Parser)]
#[command(name = "ims")]
#[command(about = "Incident Management System JSON API server.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Configuration file (in addition to ./ims.toml and IMS__* variables)
        #[arg(short, long, env = "IMS_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print a bcrypt hash for a personnel entry's password_hash
    HashPassword {
        password: String,
    },
    /// Load and validate the configuration, then exit
    CheckConfig {
        #[arg(short, long, env = "IMS_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    load_config(path.map(PathBuf::as_path)).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = load(config.as_ref())?;
            init_tracing(&config.log);
            tracing::info!(
                events = config.store.events.len(),
                personnel = config.personnel.len(),
                admins = config.auth.admins.len(),
                "starting ims"
            );
            run_http_server(config).await.context("server failed")?;
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
        Commands::CheckConfig { config } => {
            let config = load(config.as_ref())?;
            println!(
                "Configuration OK: {}:{}, {} event(s), {} ranger(s)",
                config.server.host,
                config.server.port,
                config.store.events.len(),
                config.personnel.len()
            );
        }
    }

    Ok(())
}
