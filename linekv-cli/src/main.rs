//! linekv-cli - Command-line interface for linekv
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use linekv_client::{Client, ConnectionConfig, ConnectionMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linekv-cli")]
#[command(about = "Command-line interface for line-protocol key-value servers")]
#[command(version)]
struct Cli {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = linekv_protocol::DEFAULT_PORT)]
    port: u16,

    /// Password for the AUTH handshake
    #[arg(short = 'a', long, env = "LINEKV_AUTH")]
    password: Option<String>,

    /// Database index to select after connecting
    #[arg(short = 'n', long, default_value = "0")]
    db: u32,

    /// Open a fresh socket per command instead of one persistent socket
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Ping the server
    Ping,

    /// Get the value of a key
    Get {
        key: String,
    },

    /// Set a key to a value
    Set {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// Check whether a key exists
    Exists {
        key: String,
    },

    /// Set a relative expiry in seconds
    Expire {
        key: String,
        seconds: i64,
    },

    /// Remaining time to live of a key
    Ttl {
        key: String,
    },

    /// List keys matching a glob pattern
    Keys {
        pattern: String,
    },

    /// Increment a numeric key
    Incr {
        key: String,

        /// Increment amount (INCRBY)
        #[arg(short, long)]
        by: Option<i64>,
    },

    /// Decrement a numeric key
    Decr {
        key: String,

        /// Decrement amount (DECRBY)
        #[arg(short, long)]
        by: Option<i64>,
    },

    /// Append to a string value
    Append {
        key: String,
        value: String,
    },

    /// Substring by inclusive byte range
    Substr {
        key: String,
        start: i64,
        end: i64,
    },

    /// Number of keys in the selected database
    Dbsize,

    /// Synchronous snapshot to disk
    Save,

    /// Unix timestamp of the last successful save
    Lastsave,

    /// Remove every key from the selected database
    Flushdb,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ConnectionConfig::new(cli.host.clone(), cli.port);
    if let Some(ref password) = cli.password {
        config = config.with_password(password.as_str());
    }
    if cli.ephemeral {
        config = config.with_mode(ConnectionMode::Ephemeral);
    }
    let mut client = Client::new(config);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    if cli.db != 0 {
        client.select(cli.db).await?;
    }

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, &cli.host, cli.port).await?;
        }
        Some(cmd) => {
            let result = commands::execute(&mut client, cmd).await;

            match result {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            client.close().await;
        }
    }

    Ok(())
}
