//! devobj-cli - Command-line interface for devobj devices
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use devobj_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devobj-cli")]
#[command(about = "Command-line interface for devobj devices")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "DEVOBJ_SERVER", default_value = "127.0.0.1:7402")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Read one or more objects
    Read {
        /// Object names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Write objects, all or nothing
    Write {
        /// NAME=VALUE pairs; values that are not JSON are sent as strings
        #[arg(required = true, value_parser = commands::parse_pair)]
        pairs: Vec<(String, String)>,
    },

    /// List readable objects
    List {
        /// Category name
        category: Option<String>,
    },

    /// Execute a function object
    Exec {
        /// Function name
        name: String,
    },

    /// Send a raw request line, e.g. `raw '!read "Bat_V"'`
    Raw {
        /// Request text, joined with spaces
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Print publication messages until interrupted
    Listen {
        /// Stop after this many messages
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ConnectionConfig::new(cli.server)
        .with_request_timeout(Duration::from_secs(cli.timeout.max(1)));
    let mut client = Client::new(config);

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, cli.server).await?;
        }
        Some(Commands::Listen { count }) => {
            client.connect().await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;
            eprintln!("{} on {}", "Listening".green(), cli.server);
            eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

            let mut received = 0usize;
            loop {
                if count.is_some_and(|count| received >= count) {
                    break;
                }
                tokio::select! {
                    publication = client.next_publication(None) => {
                        match publication {
                            Ok(message) => {
                                println!("{}", message);
                                received += 1;
                            }
                            Err(e) => {
                                eprintln!("{}: {}", "Error".red(), e);
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("\n{}", "Stopping...".dimmed());
                        break;
                    }
                }
            }

            client.close().await?;
        }
        Some(cmd) => {
            client.connect().await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            match commands::execute(&mut client, cmd).await {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            client.close().await?;
        }
    }

    Ok(())
}
