mod app;

use std::path::PathBuf;

use anyhow::Context;
use bde_core::AppConfig;
use clap::{Parser, Subcommand};
use reqwest::{redirect, ClientBuilder};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use crate::app::App;

#[derive(Parser)]
#[command(name = "bde", about = "Espace adhérent du BDE MMI Dijon", version)]
struct Cli {
    /// Configuration file to use instead of the one in the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a one-time login code by email
    Login { email: String },
    /// Sign in with the 6-digit code received by email
    Verify { email: String, code: String },
    /// Sign out and forget the stored session
    Logout,
    /// Show the news feed
    News,
    /// Like or unlike a news item
    Like { id: i64 },
    /// List partner perks
    Perks {
        /// Only perks that can be shown on the map, with coordinates
        #[arg(long)]
        map: bool,
    },
    /// Show the membership card
    Card,
    /// Show or edit the member profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    Show,
    Set {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("reading {}", path.display()))?;
            config.apply_env();
            config
        }
        None => AppConfig::load(),
    };
    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .timeout(config.backend.request_timeout())
        .user_agent(concat!("bde-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let data_dir = match &cli.config {
        Some(path) => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => AppConfig::config_dir()?,
    };

    let runtime = Runtime::new().context("failed to initialise Tokio runtime")?;
    runtime.block_on(async {
        let app = App::init(&config, client, &data_dir).await?;
        app.run(cli.command).await
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
