//! faas-federation gateway binary.
//!
//! Configured from environment variables, see
//! [`FederationConfig::from_env_map`](faas_federation::FederationConfig::from_env_map).

use faas_federation::runtime::init_logging;
use faas_federation::{FederationConfig, FederationServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = FederationConfig::from_env()?;
    init_logging(&config.log)?;

    tracing::info!(
        "faas-federation version: {}, providers: {}, default provider: {}",
        env!("CARGO_PKG_VERSION"),
        config.providers.join(", "),
        config.default_provider
    );

    let server = FederationServer::new(config)?;
    server.run().await?;
    Ok(())
}
