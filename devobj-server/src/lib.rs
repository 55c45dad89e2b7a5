//! # devobj-server
//!
//! TCP server for devobj.
//!
//! This crate provides:
//! - Layered configuration (defaults, YAML file, environment)
//! - A device thread that owns the object registry
//! - Newline-delimited TCP request handling
//! - Periodic publication messages fanned out to every client
//! - A sample object table

pub mod config;
pub mod demo;
pub mod device;
pub mod error;
pub mod server;

pub use config::{Config, ConfigError, NetworkConfig, ProtocolConfig, PublishConfig};
pub use demo::DemoDevice;
pub use device::{DeviceHandle, DeviceOptions, DeviceThread, ObjectTable, PublishSchedule};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
