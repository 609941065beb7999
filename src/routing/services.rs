//! Aggregation of the function lists of every provider.
//!
//! Each provider is queried concurrently, one task per provider. Results are
//! tagged with the provider's index and stored in a fixed slot, so completion
//! order never matters. A provider that cannot be reached or answers with an
//! error status is logged and skipped; a body that is not a function list
//! fails the whole aggregation.

use crate::error::{FederationError, Result};
use crate::function::{summary_to_request, FunctionSummary};
use crate::http::client::provider_label;
use crate::http::{ProviderClient, ProviderResponse};
use crate::routing::resolver::ProviderLookup;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use url::Url;

/// Path of the function listing endpoint on every provider.
pub const FUNCTIONS_PATH: &str = "/system/functions";

/// Deployed functions, grouped by provider.
#[derive(Debug, Clone, Default)]
pub struct ReadServicesResult {
    /// Function lists keyed by provider (scheme, host and port).
    pub providers: HashMap<String, Vec<FunctionSummary>>,
    /// Providers skipped because they were unreachable or answered with an error.
    pub failed: Vec<String>,
}

impl ReadServicesResult {
    /// Every listed function across providers.
    pub fn functions(&self) -> Vec<FunctionSummary> {
        self.providers.values().flatten().cloned().collect()
    }

    /// Functions listed by a single provider.
    pub fn for_provider(&self, provider: &Url) -> &[FunctionSummary] {
        self.providers
            .get(&provider_label(provider))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Listing endpoint URL for a provider base URL.
pub fn functions_url(provider: &Url) -> Url {
    let mut url = provider.clone();
    url.set_path(FUNCTIONS_PATH);
    url.set_query(None);
    url
}

/// GET every URL concurrently, returning results in input order.
///
/// Dropping the returned future aborts the in-flight requests.
pub async fn fetch_all(client: &ProviderClient, urls: &[Url]) -> Vec<Result<ProviderResponse>> {
    let mut tasks = JoinSet::new();
    for (index, url) in urls.iter().enumerate() {
        let client = client.clone();
        let url = url.clone();
        tasks.spawn(async move { (index, client.get(&url).await) });
    }

    let mut slots: Vec<Option<Result<ProviderResponse>>> = urls.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => error!("Provider fetch task failed: {}", e),
        }
    }

    slots
        .into_iter()
        .zip(urls)
        .map(|(slot, url)| {
            slot.unwrap_or_else(|| {
                Err(FederationError::Transport {
                    provider: provider_label(url),
                    message: "fetch task did not complete".to_string(),
                })
            })
        })
        .collect()
}

/// Query each provider for its deployed functions.
pub async fn read_services(client: &ProviderClient, providers: &[Url]) -> Result<ReadServicesResult> {
    let urls: Vec<Url> = providers.iter().map(functions_url).collect();
    debug!(
        "Listing functions from {} providers, timeout {:?}",
        urls.len(),
        client.timeout()
    );
    let responses = fetch_all(client, &urls).await;

    let mut result = ReadServicesResult::default();
    for (provider, response) in providers.iter().zip(responses) {
        let label = provider_label(provider);

        let checked = response.and_then(|response| {
            if response.is_error() {
                Err(FederationError::ProviderStatus {
                    provider: label.clone(),
                    status: response.status,
                })
            } else {
                Ok(response)
            }
        });

        let response = match checked {
            Ok(response) => response,
            Err(e) if e.is_provider_failure() => {
                error!("error fetching function list for {}: {}", label, e);
                result.failed.push(label);
                continue;
            }
            Err(e) => return Err(e),
        };

        let functions: Vec<FunctionSummary> =
            serde_json::from_slice(&response.body).map_err(|source| FederationError::Decode {
                provider: label.clone(),
                source,
            })?;

        debug!("{} lists {} functions", label, functions.len());
        result.providers.entry(label).or_default().extend(functions);
    }

    Ok(result)
}

/// Refresh the registry from the providers' function lists.
///
/// Every listed function is upserted; when two providers list the same name
/// the later one in configuration order wins. Nothing is evicted. Returns
/// the number of functions written.
pub async fn reconcile(
    lookup: &dyn ProviderLookup,
    client: &ProviderClient,
    providers: &[Url],
) -> Result<usize> {
    let services = read_services(client, providers).await?;

    let descriptors: Vec<_> = providers
        .iter()
        .flat_map(|p| services.for_provider(p))
        .map(summary_to_request)
        .collect();

    let count = lookup.add_functions(descriptors).await;
    if !services.failed.is_empty() {
        warn!(
            "Refreshed {} functions, skipped providers: {}",
            count,
            services.failed.join(", ")
        );
    } else {
        info!("Refreshed {} functions from {} providers", count, providers.len());
    }
    Ok(count)
}

/// Periodically reconcile the registry until the task is aborted.
pub fn spawn_refresh(
    lookup: Arc<dyn ProviderLookup>,
    client: ProviderClient,
    providers: Vec<Url>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = reconcile(lookup.as_ref(), &client, &providers).await {
                error!("Function list refresh failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_functions_url_replaces_path() {
        let provider = Url::parse("http://p1:8080/ui/?x=1").unwrap();
        assert_eq!(
            functions_url(&provider).as_str(),
            "http://p1:8080/system/functions"
        );
    }

    #[test]
    fn test_result_flattens_providers() {
        let mut result = ReadServicesResult::default();
        result.providers.insert(
            "http://p1:8080".into(),
            vec![FunctionSummary {
                name: "a".into(),
                ..Default::default()
            }],
        );
        result.providers.insert(
            "http://p2:8080".into(),
            vec![FunctionSummary {
                name: "b".into(),
                ..Default::default()
            }],
        );

        let mut names: Vec<_> = result.functions().into_iter().map(|f| f.name).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        let p2 = Url::parse("http://p2:8080").unwrap();
        assert_eq!(result.for_provider(&p2).len(), 1);
        let p3 = Url::parse("http://p3:8080").unwrap();
        assert!(result.for_provider(&p3).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_with_no_providers() {
        let client = ProviderClient::new(Duration::from_millis(100));
        assert!(fetch_all(&client, &[]).await.is_empty());
        let result = read_services(&client, &[]).await.unwrap();
        assert!(result.providers.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_skipped() {
        let client = ProviderClient::new(Duration::from_millis(500));
        let providers = vec![Url::parse("http://127.0.0.1:9").unwrap()];
        let result = read_services(&client, &providers).await.unwrap();
        assert!(result.providers.is_empty());
        assert_eq!(result.failed, vec!["http://127.0.0.1:9".to_string()]);
    }
}
