#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context as _;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

mod amount;
mod chains;
mod cli_output;
mod config;
mod errors;
mod fsutil;
mod keys;
mod paths;
mod retry;
mod rpc;
mod store;
mod wormhole;

use wormhole::actions::{
    self, AgentContext, CreateWrappedTokenRequest, TransferTokenRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliNetworkMode {
    Mainnet,
    Testnet,
    Devnet,
}

impl From<CliNetworkMode> for crate::config::NetworkMode {
    fn from(v: CliNetworkMode) -> Self {
        match v {
            CliNetworkMode::Mainnet => Self::Mainnet,
            CliNetworkMode::Testnet => Self::Testnet,
            CliNetworkMode::Devnet => Self::Devnet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "solagent", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio.
    Mcp {
        /// Override config network mode for this session.
        #[arg(long, value_enum)]
        network: Option<CliNetworkMode>,
    },

    /// Create the wrapped form of a Solana token on another chain.
    CreateWrapped {
        /// Destination chain, e.g. `BaseSepolia`.
        #[arg(long)]
        to: String,
        /// SPL token mint.
        #[arg(long)]
        token: String,
        #[arg(long, value_enum)]
        network: Option<CliNetworkMode>,
    },

    /// Transfer SOL or an SPL token from Solana to another chain.
    Transfer {
        #[arg(long)]
        to: String,
        /// Amount in human units, e.g. `0.5`.
        #[arg(long)]
        amount: String,
        /// SPL token mint. Omit for native SOL.
        #[arg(long)]
        token: Option<String>,
        #[arg(long, value_enum)]
        network: Option<CliNetworkMode>,
    },

    /// Print the MCP tool definitions.
    Tools,

    /// Print resolved paths (useful for debugging).
    Paths,
}

fn network_name(n: Option<CliNetworkMode>) -> Option<String> {
    n.map(|m| crate::config::NetworkMode::from(m).as_str().to_owned())
}

fn init_logging(paths: &paths::AgentPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("solagent.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn load_context() -> eyre::Result<AgentContext> {
    let paths = paths::AgentPaths::discover()?;
    let cfg = store::ConfigStore::new(&paths)
        .load_or_init_default()
        .context("load config")?;
    let keys = keys::KeyMaterial::from_env()?;
    Ok(AgentContext::new(cfg, keys))
}

const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::AgentPaths::discover()?;
    paths.ensure_private_dirs().context("create data dirs")?;
    let _log_guard = init_logging(&paths);

    match cli.cmd {
        Command::Mcp { network } => {
            let net = network.map(Into::into);
            let shown = network_name(network).unwrap_or_else(|| "config".to_owned());
            cli_output::print_mcp_banner(env!("CARGO_PKG_VERSION"), &shown);
            rpc::mcp_server::run(net)
                .await
                .context("mcp server failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CreateWrapped { to, token, network } => {
            let ctx = load_context()?;
            let req = CreateWrappedTokenRequest {
                destination_chain: to,
                token_address: token,
                network: network_name(network),
            };
            cli_output::print_progress_note("attesting token");
            let resp = actions::create_wrapped_token(&ctx, &req).await;
            cli_output::print_json(&resp)?;
            Ok(exit_code(resp.success))
        }
        Command::Transfer {
            to,
            amount,
            token,
            network,
        } => {
            let ctx = load_context()?;
            let req = TransferTokenRequest {
                destination_chain: to,
                transfer_amount: amount,
                token_address: token,
                network: network_name(network),
            };
            cli_output::print_progress_note("bridging tokens");
            let resp = actions::transfer_token(&ctx, &req).await;
            cli_output::print_json(&resp)?;
            Ok(exit_code(resp.success))
        }
        Command::Tools => {
            cli_output::print_json(&rpc::mcp_server::list_tools_result())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Paths => {
            cli_output::print_json(&serde_json::json!({
              "config_dir": paths.config_dir,
              "data_dir": paths.data_dir,
              "log_file": paths.log_file,
              "config_file": paths.config_file(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
