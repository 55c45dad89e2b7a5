//! TCP server implementation.
//!
//! One request per line, one response line per request. Publications from
//! the device thread are interleaved with responses as separate lines.

use crate::config::Config;
use crate::device::DeviceHandle;
use crate::error::ServerError;
use devobj_protocol::{
    encode_line, LineDecoder, ResponseWriter, Status, MIN_RESPONSE_BUFFER_LEN,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Longest accepted request line in bytes.
    pub max_request_len: usize,
    /// Include the phrase in status lines the server renders itself.
    pub verbose_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
            max_request_len: config.protocol.max_request_len,
            verbose_status: config.protocol.verbose_status,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for a devobj device.
pub struct Server {
    config: ServerConfig,
    device: DeviceHandle,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server serving requests on `device`.
    pub fn new(config: ServerConfig, device: DeviceHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            device,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Runs the server on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let device = self.device.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    device,
                                    &config,
                                    &stats,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Handles a single connection: requests, publications and timeouts.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        device: DeviceHandle,
        config: &ServerConfig,
        stats: &ServerStats,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let mut decoder = LineDecoder::new(config.max_request_len);
        let mut publications = device.subscribe();
        let mut buf = [0u8; 4096];
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::debug!("[{}] Received {} bytes", addr, n);
                            decoder.extend(&buf[..n]);
                            last_activity = Instant::now();
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                publication = publications.recv() => {
                    match publication {
                        Ok(message) => {
                            stream.write_all(&encode_line(&message)).await?;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("[{}] Skipped {} publications", addr, n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(ServerError::DeviceGone);
                        }
                    }
                }

                _ = tokio::time::sleep_until(last_activity + config.idle_timeout) => {
                    tracing::debug!("[{}] Idle timeout", addr);
                    return Ok(());
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            // Process any complete requests
            loop {
                let response = match decoder.decode_line() {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        stats.requests_total.fetch_add(1, Ordering::Relaxed);
                        let reply = device.process(line).await?;
                        if !reply.is_success() {
                            stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        }
                        tracing::debug!("[{}] Response: {}", addr, reply.status.code());
                        reply.text
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let err = ServerError::from(e);
                        tracing::debug!("[{}] Rejected request: {}", addr, err);
                        stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        status_line(
                            err.status().unwrap_or(Status::WrongFormat),
                            config.verbose_status,
                        )
                    }
                };

                stream.write_all(&encode_line(&response)).await?;
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Renders a bare status line for errors caught before the device.
fn status_line(status: Status, verbose: bool) -> String {
    let mut buf = [0u8; MIN_RESPONSE_BUFFER_LEN];
    let mut resp = ResponseWriter::new(&mut buf).with_verbose(verbose);
    resp.status(status);
    resp.as_str().to_string()
}
