//! `rksan`: operator tool for RK8s iSCSI storage backends.
//!
//! ```text
//! rksan login --portal 10.0.0.1          # discover and log in to a target
//! rksan show-config --file backend.json  # print the backend name and redacted config
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libsan::backend::ontap_san::backend_name;
use libsan::config::OntapStorageDriverConfig;
use libsan::iscsi::{self, HostRunner, IscsiadmConfig};
use libsan::types::Protocol;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rksan", version, about = "RK8s iSCSI storage backend tool")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the iSCSI targets behind a portal and log in to them.
    Login {
        /// Portal address, usually the backend's data LIF.
        #[arg(long)]
        portal: String,
    },
    /// Validate a backend config file and print it with credentials redacted.
    ShowConfig {
        #[arg(long)]
        file: PathBuf,
    },
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn login(portal: &str) -> Result<()> {
    let config = IscsiadmConfig::from_env();
    let runner = HostRunner::new(&config);
    let targets = iscsi::discover_and_login(&runner, &config.tool, portal)
        .await
        .with_context(|| format!("Failed to log in to iSCSI portal {portal}"))?;
    for target in targets {
        println!("{} {}", target.portal, target.iqn);
    }
    Ok(())
}

async fn describe_config(file: &Path) -> Result<serde_json::Value> {
    let config = OntapStorageDriverConfig::load(file)
        .await
        .with_context(|| format!("Failed to load backend config {}", file.display()))?;
    info!(file = %file.display(), "backend config is valid");
    let redacted =
        serde_json::to_value(config.redacted()).context("Failed to serialize backend config")?;
    Ok(serde_json::json!({
        "backend": backend_name(&config),
        "protocol": Protocol::Block,
        "config": redacted,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Command::Login { portal } => login(&portal).await,
        Command::ShowConfig { file } => {
            let description = describe_config(&file).await?;
            println!("{}", serde_json::to_string_pretty(&description)?);
            Ok(())
        }
    }
}
