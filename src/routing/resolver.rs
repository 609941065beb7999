//! Resolution of function names to the provider that owns them.

use crate::error::{FederationError, Result};
use crate::function::FunctionDescriptor;
use crate::routing::provider::ProviderDirectory;
use crate::routing::registry::FunctionRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Annotation whose value names the provider hostname owning a function.
pub const AFFINITY_ANNOTATION: &str = "com.openfaas.federation.gatewayx";

/// Lets the federation determine which provider is currently
/// responsible for a given function.
#[async_trait]
pub trait ProviderLookup: Send + Sync {
    /// Resolve the provider URL for `function_name`.
    async fn resolve(&self, function_name: &str) -> Result<Url>;

    /// Record a function observed on a create or update request, returning
    /// the descriptor it replaced.
    async fn add_function(&self, descriptor: FunctionDescriptor) -> Option<FunctionDescriptor>;

    /// Get the cached descriptor of a function.
    async fn get_function(&self, name: &str) -> Option<FunctionDescriptor>;

    /// Snapshot of every cached function.
    async fn get_functions(&self) -> Vec<FunctionDescriptor>;

    /// Forget a function after it was deleted.
    async fn remove_function(&self, name: &str) -> Option<FunctionDescriptor>;

    /// Undo `written` by putting `previous` back, or removing the entry when
    /// `previous` is `None`. Does nothing if `written` is no longer cached.
    async fn restore_function(
        &self,
        written: &FunctionDescriptor,
        previous: Option<FunctionDescriptor>,
    ) -> bool;

    /// Record a batch of functions, returning how many were written.
    async fn add_functions(&self, descriptors: Vec<FunctionDescriptor>) -> usize {
        let count = descriptors.len();
        for descriptor in descriptors {
            self.add_function(descriptor).await;
        }
        count
    }
}

/// Resolves providers from the affinity annotation, falling back to the
/// default provider.
pub struct DefaultProviderRouting {
    directory: Arc<ProviderDirectory>,
    registry: FunctionRegistry,
}

impl DefaultProviderRouting {
    /// Create a routing table over an already built provider directory.
    pub fn new(directory: Arc<ProviderDirectory>) -> Self {
        Self {
            directory,
            registry: FunctionRegistry::new(),
        }
    }

    /// Parse the configured providers and build the routing table.
    pub fn from_urls<S: AsRef<str>>(providers: &[S], default_provider: &str) -> Result<Self> {
        let directory = ProviderDirectory::new(providers, default_provider)?;
        Ok(Self::new(Arc::new(directory)))
    }

    fn select(&self, descriptor: &FunctionDescriptor) -> Url {
        let default_provider = self.directory.default_provider();

        let Some(constraint) = descriptor.annotation(AFFINITY_ANNOTATION) else {
            info!(
                "{} constraint not found using default provider {}",
                AFFINITY_ANNOTATION, default_provider
            );
            return default_provider.clone();
        };

        match self.directory.match_hostname(constraint) {
            Some(provider) => provider.url.clone(),
            None => {
                info!(
                    "{} constraint value found but does not exist in provider list, using default provider {}",
                    constraint, default_provider
                );
                default_provider.clone()
            }
        }
    }
}

#[async_trait]
impl ProviderLookup for DefaultProviderRouting {
    async fn resolve(&self, function_name: &str) -> Result<Url> {
        let descriptor = self
            .registry
            .get_function(function_name)
            .await
            .ok_or_else(|| FederationError::FunctionNotFound(function_name.to_string()))?;

        Ok(self.select(&descriptor))
    }

    async fn add_function(&self, descriptor: FunctionDescriptor) -> Option<FunctionDescriptor> {
        self.registry.add_function(descriptor).await
    }

    async fn get_function(&self, name: &str) -> Option<FunctionDescriptor> {
        self.registry.get_function(name).await
    }

    async fn get_functions(&self) -> Vec<FunctionDescriptor> {
        self.registry.get_functions().await
    }

    async fn remove_function(&self, name: &str) -> Option<FunctionDescriptor> {
        self.registry.remove_function(name).await
    }

    async fn restore_function(
        &self,
        written: &FunctionDescriptor,
        previous: Option<FunctionDescriptor>,
    ) -> bool {
        self.registry.restore_function(written, previous).await
    }

    async fn add_functions(&self, descriptors: Vec<FunctionDescriptor>) -> usize {
        self.registry.upsert_all(descriptors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::CreateFunctionRequest;

    fn routing() -> DefaultProviderRouting {
        DefaultProviderRouting::from_urls(
            &["http://p1:8080", "http://p2:8080", "http://Faas-K8s"],
            "http://p1:8080",
        )
        .unwrap()
    }

    fn url(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_function_is_not_found() {
        let routing = routing();
        let err = routing.resolve("missing").await.unwrap_err();
        assert!(matches!(err, FederationError::FunctionNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_no_annotations_uses_default() {
        let routing = routing();
        routing
            .add_function(CreateFunctionRequest::new("plain", "img/plain"))
            .await;
        assert_eq!(routing.resolve("plain").await.unwrap(), url("http://p1:8080"));
    }

    #[tokio::test]
    async fn test_annotations_without_affinity_use_default() {
        let routing = routing();
        routing
            .add_function(
                CreateFunctionRequest::new("tagged", "img/tagged").with_annotation("topic", "x"),
            )
            .await;
        assert_eq!(routing.resolve("tagged").await.unwrap(), url("http://p1:8080"));
    }

    #[tokio::test]
    async fn test_affinity_selects_provider_ignoring_case_and_port() {
        let routing = routing();
        routing
            .add_function(
                CreateFunctionRequest::new("echo", "img/echo")
                    .with_annotation(AFFINITY_ANNOTATION, "P2"),
            )
            .await;
        routing
            .add_function(
                CreateFunctionRequest::new("k8s", "img/k8s")
                    .with_annotation(AFFINITY_ANNOTATION, "faas-k8s"),
            )
            .await;

        assert_eq!(routing.resolve("echo").await.unwrap(), url("http://p2:8080"));
        assert_eq!(routing.resolve("k8s").await.unwrap(), url("http://faas-k8s"));
    }

    #[tokio::test]
    async fn test_unknown_affinity_falls_back_to_default() {
        let routing = routing();
        routing
            .add_function(
                CreateFunctionRequest::new("stale", "img/stale")
                    .with_annotation(AFFINITY_ANNOTATION, "p9"),
            )
            .await;
        assert_eq!(routing.resolve("stale").await.unwrap(), url("http://p1:8080"));
    }

    #[tokio::test]
    async fn test_overwriting_annotation_changes_resolution() {
        let routing = routing();
        routing
            .add_function(
                CreateFunctionRequest::new("echo", "img/echo")
                    .with_annotation(AFFINITY_ANNOTATION, "p2"),
            )
            .await;
        assert_eq!(routing.resolve("echo").await.unwrap(), url("http://p2:8080"));

        routing
            .add_function(CreateFunctionRequest::new("echo", "img/echo"))
            .await;
        assert_eq!(routing.resolve("echo").await.unwrap(), url("http://p1:8080"));
    }

    #[tokio::test]
    async fn test_removed_function_no_longer_resolves() {
        let routing = routing();
        routing
            .add_function(CreateFunctionRequest::new("gone", "img/gone"))
            .await;
        assert!(routing.remove_function("gone").await.is_some());
        assert!(routing.resolve("gone").await.is_err());
    }

    #[tokio::test]
    async fn test_default_provider_outside_directory() {
        let routing =
            DefaultProviderRouting::from_urls(&["http://p2:8080"], "http://fallback:9000")
                .unwrap();
        routing
            .add_function(CreateFunctionRequest::new("plain", "img/plain"))
            .await;
        assert_eq!(
            routing.resolve("plain").await.unwrap(),
            url("http://fallback:9000")
        );
    }
}
