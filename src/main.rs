//! devobj - device data-object server
//!
//! Serves the sample object table over the line-based text protocol.

use devobj_server::demo::DEFAULT_PUBLICATION;
use devobj_server::{Config, DemoDevice, DeviceOptions, DeviceThread, Server, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if DEVOBJ_CONFIG is set, then env overrides)
    let config_path = std::env::var("DEVOBJ_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting devobj server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!(
        "  Response buffer: {} bytes, {} tokens per request",
        config.protocol.response_buffer_len,
        config.protocol.max_tokens
    );

    let mut options = DeviceOptions::from_config(&config);
    if let Some(schedule) = options.publish.as_mut() {
        if schedule.ids.is_empty() {
            schedule.ids = DEFAULT_PUBLICATION.to_vec();
        }
        tracing::info!(
            "  Publications: every {} ms, {} object(s)",
            schedule.interval.as_millis(),
            schedule.ids.len()
        );
    } else {
        tracing::info!("  Publications: disabled");
    }

    let device = DeviceThread::spawn(DemoDevice::new, options)?;
    let server = Arc::new(Server::new(
        ServerConfig::from_config(&config),
        device.handle(),
    ));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    device.shutdown()?;

    tracing::info!("Server stopped");
    Ok(())
}
