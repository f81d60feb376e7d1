mod daemon;
mod memory_cmds;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use callisto_config::AppConfig;
use callisto_memory::MemoryManager;
use callisto_runtime::DaemonClient;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const REQUEST_CONNECT_ATTEMPTS: usize = 3;

#[derive(Debug, Parser)]
#[command(
    name = "callisto",
    version,
    about = "Per-user profile documents and conversation logs"
)]
struct Cli {
    /// Configuration file (defaults to config/default.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override `storage.data_dir`.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Profile documents.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Conversation logs.
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Count users and conversation logs.
    Stats,
    /// Serve JSON-line requests on the configured socket, or on stdin/stdout.
    Serve {
        #[arg(long)]
        stdio: bool,
    },
    /// Send one raw JSON request to the running server and print the reply.
    /// Example: callisto request '{"op":"list_users"}'
    Request {
        #[arg(value_name = "JSON")]
        json: String,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    Exists {
        uuid: String,
    },
    Get {
        uuid: String,
    },
    Create {
        uuid: String,
        /// Initial document as a JSON object.
        #[arg(long)]
        data: Option<String>,
    },
    /// Deep-merge a JSON object into an existing profile.
    Update {
        uuid: String,
        #[arg(long)]
        data: String,
    },
    SetField {
        uuid: String,
        category: String,
        field: String,
        /// JSON value; plain text is stored as a string.
        #[arg(long)]
        value: String,
    },
    AddToList {
        uuid: String,
        list_name: String,
        #[arg(long)]
        value: String,
    },
    Delete {
        uuid: String,
    },
    List,
    /// Fold SOURCE into TARGET and remove SOURCE.
    Merge {
        source: String,
        target: String,
    },
}

#[derive(Debug, Subcommand)]
enum LogCommands {
    /// Replace a log. Content is read from stdin when --content is omitted.
    Store {
        uuid: String,
        name: String,
        #[arg(long)]
        content: Option<String>,
    },
    Append {
        uuid: String,
        name: String,
        message: String,
        /// Append the message without a `[YYYY-MM-DD HH:MM:SS]` prefix.
        #[arg(long)]
        no_timestamp: bool,
    },
    /// Write the same log for every participant.
    StoreMulti {
        name: String,
        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        uuids: Vec<String>,
        #[arg(long)]
        content: Option<String>,
    },
    Get {
        uuid: String,
        name: String,
    },
    Exists {
        uuid: String,
        name: String,
    },
    List {
        uuid: String,
    },
    Delete {
        uuid: String,
        name: String,
    },
    /// Keep the last N lines, or only lines dated within a range.
    Prune {
        uuid: String,
        name: String,
        #[arg(long)]
        keep_lines: Option<usize>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        start_date: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        end_date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load_from(&config_path)?;

    // stdout carries protocol responses, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir());

    match cli.command {
        Commands::User { command } => {
            let memory = MemoryManager::open(&data_dir)?;
            let request = memory_cmds::user_request(command)?;
            memory_cmds::run_local(&memory, request)
        }
        Commands::Log { command } => {
            let memory = MemoryManager::open(&data_dir)?;
            let request = memory_cmds::log_request(command)?;
            memory_cmds::run_local(&memory, request)
        }
        Commands::Stats => {
            let memory = MemoryManager::open(&data_dir)?;
            memory_cmds::run_local(&memory, callisto_runtime::MemoryRequest::Stats)
        }
        Commands::Serve { stdio } => {
            let memory = MemoryManager::open(&data_dir)?;
            if stdio {
                daemon::run_stdio(memory).await?;
            } else {
                daemon::run_socket(memory, &config.daemon.socket_path).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Request { json } => {
            let client = DaemonClient::new(&config.daemon.socket_path);
            client.connect_with_backoff(REQUEST_CONNECT_ATTEMPTS).await?;
            let raw = client.send_raw(&json).await?;
            let response: callisto_runtime::MemoryResponse = serde_json::from_str(&raw)?;
            memory_cmds::print_response(&response)
        }
    }
}
