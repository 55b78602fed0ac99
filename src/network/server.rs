//! TCP Server
//!
//! Accepts connections and dispatches them to a pool of worker threads.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::store::Store;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for CaskKV
///
/// ## Threading:
/// - The thread calling `run()` accepts connections (non-blocking, so it
///   can notice shutdown).
/// - Accepted streams go through a bounded crossbeam channel to
///   `max_connections` worker threads, one connection per worker at a time.
pub struct Server {
    config: Config,
    store: Arc<Store>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, store: Arc<Store>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            CaskError::Network(format!("Cannot bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            store,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops `run()` when set; can be handed to another thread
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// Workers finish their current connection before `run()` returns;
    /// an idle client is dropped once its read timeout expires.
    pub fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(
            "Listening on {} with {} workers",
            addr,
            self.config.max_connections
        );

        let (tx, rx) = channel::bounded(self.config.max_connections);

        let mut workers = Vec::with_capacity(self.config.max_connections);
        for worker_id in 0..self.config.max_connections {
            let rx: channel::Receiver<std::net::TcpStream> = rx.clone();
            let store = Arc::clone(&self.store);
            let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

            let handle = thread::Builder::new()
                .name(format!("caskkv-worker-{}", worker_id))
                .spawn(move || {
                    for stream in rx.iter() {
                        let result = Connection::new(stream, Arc::clone(&store))
                            .and_then(|mut conn| {
                                conn.set_timeouts(read_ms, write_ms)?;
                                conn.handle()
                            });
                        if let Err(e) = result {
                            tracing::warn!("Connection error: {}", e);
                        }
                    }
                })?;
            workers.push(handle);
        }
        drop(rx);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!("Accepted connection from {}", peer);
                    stream.set_nonblocking(false)?;
                    if tx.send(stream).is_err() {
                        return Err(CaskError::Network("Worker pool is gone".to_string()));
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }

        tracing::info!("Shutting down server on {}", addr);
        drop(tx);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
