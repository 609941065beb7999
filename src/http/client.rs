//! Outbound HTTP client used to talk to providers.

use crate::error::{FederationError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderName};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Headers that only make sense for a single connection.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A buffered response received from a provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, hop-by-hop headers removed.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl ProviderResponse {
    /// Whether the provider answered with an error status.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// HTTP client for provider calls with a per-call timeout.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl ProviderClient {
    /// Create a client whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a GET request.
    pub async fn get(&self, url: &Url) -> Result<ProviderResponse> {
        self.send(Method::GET, url, &HeaderMap::new(), Bytes::new())
            .await
    }

    /// Send a request and buffer the whole response.
    pub async fn send(
        &self,
        method: Method,
        url: &Url,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<ProviderResponse> {
        let provider = provider_label(url);
        let uri = url
            .as_str()
            .parse::<Uri>()
            .map_err(|e| FederationError::Transport {
                provider: provider.clone(),
                message: e.to_string(),
            })?;

        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if let Some(target) = builder.headers_mut() {
            copy_end_to_end(headers, target);
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| FederationError::Transport {
                provider: provider.clone(),
                message: e.to_string(),
            })?;

        debug!("{} {}", method, url);

        let call = async {
            let response = self.client.request(request).await.map_err(|e| {
                FederationError::Transport {
                    provider: provider.clone(),
                    message: e.to_string(),
                }
            })?;

            let (parts, incoming) = response.into_parts();
            let body = incoming
                .collect()
                .await
                .map_err(|e| FederationError::Transport {
                    provider: provider.clone(),
                    message: e.to_string(),
                })?
                .to_bytes();

            let mut headers = HeaderMap::new();
            copy_end_to_end(&parts.headers, &mut headers);

            Ok::<_, FederationError>(ProviderResponse {
                status: parts.status.as_u16(),
                headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FederationError::Transport {
                provider,
                message: format!("request timed out after {:?}", self.timeout),
            }),
        }
    }
}

/// Copy headers, dropping the hop-by-hop ones.
pub fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if is_hop_by_hop(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Scheme, host and port of a URL, used to name a provider in errors.
pub fn provider_label(url: &Url) -> String {
    url.origin().ascii_serialization()
}
