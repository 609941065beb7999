//! # faas-federation - one gateway in front of many FaaS providers
//!
//! faas-federation presents several independent function-execution
//! backends ("providers") behind a single endpoint. Every function name is
//! resolved to the provider that owns it and the request is forwarded there.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Federation Gateway                           │
//! │  ┌───────────────────────┐      ┌──────────────────────────────┐   │
//! │  │   Function Registry   │◄─────│  Service Aggregator          │   │
//! │  │ (name -> descriptor)  │      │  (GET /system/functions on   │   │
//! │  └──────────┬────────────┘      │   every provider, fan-out)   │   │
//! │             │                   └──────────────────────────────┘   │
//! │             ▼                                                       │
//! │  ┌───────────────────────┐      ┌──────────────────────────────┐   │
//! │  │       Resolver        │─────►│     Provider Directory       │   │
//! │  │ (affinity annotation) │      │ (hostname -> URL, default)   │   │
//! │  └───────────────────────┘      └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//!            │                 │                 │
//!            ▼                 ▼                 ▼
//!      ┌──────────┐      ┌──────────┐      ┌──────────┐
//!      │Provider 1│      │Provider 2│      │   ...    │
//!      └──────────┘      └──────────┘      └──────────┘
//! ```
//!
//! ## Provider affinity
//!
//! A function chooses its provider with the
//! `com.openfaas.federation.gatewayx` annotation, whose value is the
//! provider hostname (case-insensitive, port ignored). Functions without the
//! annotation, or naming an unknown provider, go to the default provider.
//! Functions the gateway has never seen are not routed at all.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use faas_federation::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let routing = DefaultProviderRouting::from_urls(
//!         &["http://p1:8080", "http://p2:8080"],
//!         "http://p1:8080",
//!     )?;
//!
//!     routing
//!         .add_function(
//!             CreateFunctionRequest::new("echo", "functions/alpine:latest")
//!                 .with_annotation(AFFINITY_ANNOTATION, "p2"),
//!         )
//!         .await;
//!
//!     let provider = routing.resolve("echo").await?;
//!     assert_eq!(provider.host_str(), Some("p2"));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod function;
pub mod http;
pub mod routing;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::{FederationError, Result};
    pub use crate::function::{CreateFunctionRequest, FunctionDescriptor, FunctionSummary};
    pub use crate::http::ProviderClient;
    pub use crate::routing::{
        read_services, reconcile, DefaultProviderRouting, FunctionRegistry, ProviderDirectory,
        ProviderLookup, ReadServicesResult, AFFINITY_ANNOTATION,
    };
    pub use crate::runtime::{FederationConfig, FederationServer};
}

// Re-export for convenience
pub use error::{FederationError, Result};
pub use routing::{DefaultProviderRouting, ProviderLookup};
pub use runtime::{FederationConfig, FederationServer};
