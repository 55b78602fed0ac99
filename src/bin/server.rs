//! CaskKV Server Binary
//!
//! Opens a store and serves it over TCP.

use std::sync::Arc;

use clap::Parser;
use caskkv::config::DEFAULT_BATCH_SYNC_EVERY;
use caskkv::network::Server;
use caskkv::{Config, Store, SyncPolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskKV Server
#[derive(Parser, Debug)]
#[command(name = "caskkv-server")]
#[command(about = "Bitcask-style key-value store server")]
#[command(version)]
struct Args {
    /// Data directory holding the segment files
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "64")]
    max_connections: usize,

    /// Sync mode: ALWAYS or EVERY_N
    #[arg(short, long, default_value = "ALWAYS")]
    sync_mode: String,

    /// Appends between flushes in EVERY_N mode
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SYNC_EVERY)]
    batch_sync_every: usize,

    /// Periodic flush interval in ms (reserved)
    #[arg(long, default_value = "50")]
    sync_interval_ms: u64,

    /// Compaction threshold in bytes (reserved)
    #[arg(long, default_value = "0")]
    compact_threshold_bytes: u64,

    /// Connection read timeout in ms (0 disables)
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Connection write timeout in ms (0 disables)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("CaskKV Server v{}", caskkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_policy = match SyncPolicy::parse(&args.sync_mode, args.batch_sync_every) {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_policy(sync_policy)
        .sync_interval_ms(args.sync_interval_ms)
        .compact_threshold_bytes(args.compact_threshold_bytes)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .build();

    // Open store
    let store = match Store::open(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store initialized successfully");

    // Start server
    let server = match Server::bind(config, Arc::clone(&store)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
