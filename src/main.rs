#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{debug, info};

use ihpc_ssh::ihpc::config::{resolve_config_path, resolve_inside_network, resolve_list_timeout};
use ihpc_ssh::ihpc::process::{ProcessRunner, TokioProcessRunner};
use ihpc_ssh::ihpc::shell::ConsoleShell;
use ihpc_ssh::ihpc::store::ConfigStore;
use ihpc_ssh::ihpc::types::NetworkLocation;
use ihpc_ssh::ihpc::{IhpcCommands, detect_network_location};

#[derive(Parser)]
#[command(
    name = "ihpc-ssh",
    about = "Keep ~/.ssh/config in sync with UTS iHPC compute nodes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SSH config file to manage (default: ~/.ssh/config, env: IHPC_SSH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Make sure the uts gateway has a username, prompting if it does not
    Setup {
        /// Username to use instead of prompting
        #[arg(long)]
        user: Option<String>,
    },
    /// Change the uts gateway username
    SetUser {
        /// Username to use instead of prompting
        #[arg(long)]
        user: Option<String>,
    },
    /// Add or update the SSH config block for a compute node
    Add {
        /// Node name, e.g. mercury3
        node: String,
        /// Gateway username to use if the gateway is not configured yet
        #[arg(long)]
        user: Option<String>,
        /// Whether this machine is inside the facility network (default: detected, env: IHPC_INSIDE_NETWORK)
        #[arg(long)]
        inside_network: Option<bool>,
    },
    /// List available compute nodes
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        /// Listing timeout in seconds (default: 10, env: IHPC_LIST_TIMEOUT)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Show the configured uts gateway username
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --json
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config_path = resolve_config_path(cli.config)?;
    info!("Managing {}", config_path.display());

    let user = match &cli.command {
        Command::Setup { user } | Command::SetUser { user } | Command::Add { user, .. } => {
            user.clone()
        }
        Command::List { .. } | Command::Status { .. } => None,
    };
    let list_timeout = match &cli.command {
        Command::List { timeout_secs, .. } => resolve_list_timeout(*timeout_secs),
        _ => resolve_list_timeout(None),
    };

    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);
    let commands = IhpcCommands::new(
        ConfigStore::new(config_path),
        runner.clone(),
        Arc::new(ConsoleShell::new(user)),
        list_timeout,
    );

    // Failures have already been reported to the user by the shell
    let succeeded = match cli.command {
        Command::Setup { .. } => commands.ensure_gateway_configured().await.is_ok(),
        Command::SetUser { .. } => commands.set_gateway_user().await.is_ok(),
        Command::Add {
            node,
            inside_network,
            ..
        } => {
            let location = match resolve_inside_network(inside_network) {
                Some(true) => NetworkLocation::Inside,
                Some(false) => NetworkLocation::Outside,
                None => detect_network_location(runner.as_ref()).await,
            };
            debug!("Network location: {:?}", location);
            commands.configure_node(&node, location).await.is_ok()
        }
        Command::List { json, .. } => {
            let listing = commands.list_nodes().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for node in &listing.nodes {
                    println!("{} {}", node.padded_name(), node.summary());
                }
            }
            listing.warning.is_none()
        }
        Command::Status { json } => {
            let status = commands.gateway_status().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", status);
            }
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
