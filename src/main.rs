//! ChartWatch CLI - main entry point

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chartwatch::config::{DEFAULT_USERS_FILE, STANDARD_MODEL};
use chartwatch::{bot, metrics, Config, OpenAIClient, TimeframeProfile, UserStore};

#[derive(Parser)]
#[command(name = "chartwatch")]
#[command(about = "Telegram chart analysis bot", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Run {
        /// Chart timeframe profile: m15 | h1
        #[arg(long)]
        profile: Option<String>,
    },

    /// Verify OpenAI credentials with a minimal request
    Check,

    /// Inspect or edit the allow-list without starting the bot
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// Print admins and allowed users
    List,

    /// Add a user to the allow-list
    Add { user_id: i64 },

    /// Remove a user from the allow-list
    Remove { user_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => {
                tokio::spawn(async move {
                    if let Err(err) = metrics::serve(addr).await {
                        error!("Metrics server error: {}", err);
                    }
                });
            }
            Err(err) => warn!(addr, "Invalid metrics address: {}", err),
        }
    }

    match cli.command {
        Commands::Run { profile } => {
            let mut config = Config::from_env()?;
            if let Some(profile) = profile {
                config.profile = TimeframeProfile::parse(&profile)?;
            }
            bot::run(config).await
        }

        Commands::Check => {
            let config = Config::from_env()?;
            let client = OpenAIClient::from_config(&config)?;
            let reply = client
                .chat_completion("API connectivity test", STANDARD_MODEL, 10)
                .await
                .context("credential check failed")?;
            info!(%reply, "Credentials look valid");
            println!("OK");
            Ok(())
        }

        Commands::Users { action } => {
            let path = std::env::var("USERS_FILE")
                .unwrap_or_else(|_| DEFAULT_USERS_FILE.to_string());
            let mut store = UserStore::load(&path);

            match action {
                UsersAction::List => {
                    println!("admins: {:?}", store.admins());
                    println!("allowed: {:?}", store.allowed_users());
                }
                UsersAction::Add { user_id } => {
                    if store.add_allowed_user(user_id) {
                        println!("added {}", user_id);
                    } else {
                        println!("{} is already allowed", user_id);
                    }
                }
                UsersAction::Remove { user_id } => {
                    if store.remove_allowed_user(user_id) {
                        println!("removed {}", user_id);
                    } else {
                        println!("{} not found", user_id);
                    }
                }
            }
            Ok(())
        }
    }
}
