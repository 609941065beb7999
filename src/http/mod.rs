//! HTTP plumbing: the outbound provider client and gateway responses.

pub mod client;
mod response;

pub use client::{ProviderClient, ProviderResponse};
pub use response::GatewayResponse;
