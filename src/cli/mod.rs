//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod auth;
pub mod chat;
pub mod sessions;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::client::GatewayClient;
use crate::api::ApiResult;
use crate::auth::keyring_token;
use crate::core::config::{path_display, Config, GatewayConfig};
use crate::utils::logging::init_tracing;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "chatline")]
#[command(version = VERSION)]
#[command(about = "Chat with an LLM gateway and manage remote terminal sessions")]
#[command(
    long_about = "Chatline streams chat replies from an LLM gateway to your terminal and \
lists or inspects the gateway's remote terminal sessions.\n\n\
Authentication:\n\
  Use 'chatline auth' to store a gateway token in your system keyring.\n\n\
Environment Variables:\n\
  CHATLINE_BASE_URL   Gateway root URL (overrides the config file)\n\
  CHATLINE_API_TOKEN  Gateway token (takes precedence over the keyring)\n\
  RUST_LOG            Diagnostic log filter (default: warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Write diagnostics to this file instead of stderr
    #[arg(short = 'l', long = "log-file", global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the reply
    Chat {
        /// Message text (multiple words are joined with spaces)
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
        /// Continue this thread instead of the last one
        #[arg(short = 't', long)]
        thread: Option<String>,
        /// Start a new thread
        #[arg(short = 'n', long, conflicts_with = "thread")]
        new: bool,
        /// Model to use for this message
        #[arg(short = 'm', long)]
        model: Option<String>,
    },
    /// List remote terminal sessions
    Sessions {
        /// Skip the cached list and ask the gateway again
        #[arg(short = 'r', long)]
        refresh: bool,
    },
    /// Show one remote terminal session
    Session {
        /// Session id
        id: String,
    },
    /// Print the effective configuration
    Config,
    /// Store a gateway token in the system keyring
    Auth,
    /// Remove the stored gateway token
    Deauth,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    match args.command {
        Commands::Chat {
            message,
            thread,
            new,
            model,
        } => chat::run_chat(message, thread, new, model).await,
        Commands::Sessions { refresh } => sessions::run_sessions(refresh).await,
        Commands::Session { id } => sessions::run_session(id).await,
        Commands::Config => {
            let config_path = Config::get_config_path()?;
            let config = Config::load_from_path(&config_path)?;
            println!("Config file: {}", path_display(&config_path));
            resolve_gateway_config(&config, None).print_all();
            Ok(())
        }
        Commands::Auth => auth::run_auth(),
        Commands::Deauth => auth::run_deauth(),
    }
}

/// Config file, then environment, then keyring for the token.
pub fn resolve_gateway_config(config: &Config, model: Option<String>) -> GatewayConfig {
    let gateway = GatewayConfig::from_config(config)
        .with_process_env()
        .with_model(model);
    if gateway.api_token.is_some() {
        gateway
    } else {
        gateway.with_token_if_missing(keyring_token())
    }
}

pub fn gateway_client(config: &Config, model: Option<String>) -> ApiResult<GatewayClient> {
    GatewayClient::new(resolve_gateway_config(config, model))
}
