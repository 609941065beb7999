//! Gateway runtime: configuration, logging setup and the HTTP server.

mod config;
pub mod logging;
mod server;

pub use config::FederationConfig;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use server::{function_name, target_url, FederationServer};
