//! Provider resolution and service aggregation.
//!
//! The [`ProviderDirectory`] is built once at startup. The
//! [`FunctionRegistry`] caches descriptors seen on create and update
//! requests and on periodic refreshes. [`DefaultProviderRouting`] ties both
//! together to answer which provider owns a function.

mod provider;
mod registry;
mod resolver;
pub mod services;

pub use provider::{hostname_without_port, Provider, ProviderDirectory};
pub use registry::FunctionRegistry;
pub use resolver::{DefaultProviderRouting, ProviderLookup, AFFINITY_ANNOTATION};
pub use services::{read_services, reconcile, spawn_refresh, ReadServicesResult};
