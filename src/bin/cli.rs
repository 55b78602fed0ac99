//! CaskKV CLI Client
//!
//! Command-line interface for interacting with a CaskKV server.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use caskkv::network::Client;

/// CaskKV CLI
#[derive(Parser, Debug)]
#[command(name = "caskkv-cli")]
#[command(about = "CLI for CaskKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Set several pairs at once, given as key=value
    Batch {
        /// Pairs in key=value form
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// List live pairs with keys in [start, end]
    Range {
        /// First key of the range (inclusive)
        start: String,

        /// Last key of the range (inclusive)
        end: String,
    },

    /// Ping the server
    Ping,

    /// Show store statistics
    Stats,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> caskkv::Result<ExitCode> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Get { key } => match client.get(&key)? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => {
                println!("(not found)");
                return Ok(ExitCode::from(1));
            }
        },
        Commands::Set { key, value } => {
            client.put(&key, value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            client.delete(&key)?;
            println!("OK");
        }
        Commands::Batch { pairs } => {
            let items = pairs
                .iter()
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => Ok((key.to_string(), value.as_bytes().to_vec())),
                    None => Err(caskkv::CaskError::InvalidArgument(format!(
                        "expected key=value, got '{}'",
                        pair
                    ))),
                })
                .collect::<caskkv::Result<Vec<_>>>()?;
            let count = items.len();
            client.batch_put(items)?;
            println!("OK ({} pairs)", count);
        }
        Commands::Range { start, end } => {
            for (key, value) in client.range(&start, &end)? {
                println!("{}={}", key, String::from_utf8_lossy(&value));
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
        Commands::Stats => {
            let stats = client.stats()?;
            println!("segments:            {}", stats.segments);
            println!("active_segment:      {}", stats.active_segment_id);
            println!("active_segment_size: {}", stats.active_segment_size);
            println!("live_keys:           {}", stats.live_keys);
            println!("indexed_keys:        {}", stats.indexed_keys);
            println!("pending_sync_writes: {}", stats.pending_sync_writes);
            println!("sync_policy:         {}", stats.sync_policy);
        }
    }

    Ok(ExitCode::SUCCESS)
}
