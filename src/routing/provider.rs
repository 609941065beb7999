//! Provider directory built once from configuration.

use crate::error::{FederationError, Result};
use std::collections::HashMap;
use url::Url;

/// A backend that hosts and executes functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Hostname without port, used as the provider's identity.
    pub hostname: String,
    /// Base URL requests are forwarded to.
    pub url: Url,
}

impl Provider {
    /// Create a provider from its base URL.
    pub fn new(url: Url) -> Self {
        Self {
            hostname: hostname_without_port(&url),
            url,
        }
    }
}

/// Immutable mapping from provider hostname to provider.
///
/// Built before serving begins and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct ProviderDirectory {
    providers: HashMap<String, Provider>,
    urls: Vec<Url>,
    default_provider: Url,
}

impl ProviderDirectory {
    /// Parse the configured provider URLs and the default provider.
    ///
    /// Only plain `http` URLs with a host are accepted.
    pub fn new<S: AsRef<str>>(providers: &[S], default_provider: &str) -> Result<Self> {
        let mut map = HashMap::new();
        let mut urls = Vec::with_capacity(providers.len());

        for value in providers {
            let url = parse_url(value.as_ref())?;
            let provider = Provider::new(url.clone());
            map.insert(provider.hostname.clone(), provider);
            urls.push(url);
        }

        let default_provider = parse_url(default_provider)?;

        Ok(Self {
            providers: map,
            urls,
            default_provider,
        })
    }

    /// The provider used when no affinity applies.
    pub fn default_provider(&self) -> &Url {
        &self.default_provider
    }

    /// Configured provider URLs, in configuration order.
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// Find the provider whose hostname matches `name`, ignoring case.
    pub fn match_hostname(&self, name: &str) -> Option<&Provider> {
        self.providers
            .values()
            .find(|p| p.hostname.eq_ignore_ascii_case(name))
    }

    /// Number of distinct providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn parse_url(value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|source| FederationError::InvalidProviderUrl {
        value: value.to_string(),
        source,
    })?;

    if url.host_str().is_none() {
        return Err(FederationError::InvalidProviderUrl {
            value: value.to_string(),
            source: url::ParseError::EmptyHost,
        });
    }

    if url.scheme() != "http" {
        return Err(FederationError::UnsupportedScheme {
            value: value.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    Ok(url)
}

/// Hostname of a URL with any port removed.
pub fn hostname_without_port(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_keys_by_hostname() {
        let dir =
            ProviderDirectory::new(&["http://p1:8080", "http://p2:8080"], "http://p1:8080")
                .unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.urls().len(), 2);
        assert_eq!(dir.default_provider().as_str(), "http://p1:8080/");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let dir = ProviderDirectory::new(&["http://Faas-Swarm:8080"], "http://p1").unwrap();
        let found = dir.match_hostname("FAAS-SWARM").unwrap();
        assert_eq!(found.url.port(), Some(8080));
        assert!(dir.match_hostname("faas-k8s").is_none());
    }

    #[test]
    fn test_hostname_without_port() {
        let url = Url::parse("https://gateway.example.com:31112/path").unwrap();
        assert_eq!(hostname_without_port(&url), "gateway.example.com");
    }

    #[test]
    fn test_invalid_provider_url_is_rejected() {
        let err = ProviderDirectory::new(&["not a url"], "http://p1").unwrap_err();
        assert!(matches!(err, FederationError::InvalidProviderUrl { .. }));
    }

    #[test]
    fn test_invalid_default_provider_is_rejected() {
        let err = ProviderDirectory::new(&["http://p1"], "::").unwrap_err();
        assert!(err.to_string().contains("::"));
    }

    #[test]
    fn test_https_provider_is_rejected_at_startup() {
        let err =
            ProviderDirectory::new(&["https://gateway.example.com"], "http://p1").unwrap_err();
        assert!(matches!(
            err,
            FederationError::UnsupportedScheme { ref scheme, .. } if scheme == "https"
        ));

        let err = ProviderDirectory::new(&["http://p1"], "https://p1").unwrap_err();
        assert!(matches!(err, FederationError::UnsupportedScheme { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let dir = ProviderDirectory::new::<&str>(&[], "http://p1").unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.len(), 0);
    }

    #[test]
    fn test_url_without_host_is_rejected() {
        let err = ProviderDirectory::new(&["mailto:ops@example.com"], "http://p1").unwrap_err();
        assert!(matches!(err, FederationError::InvalidProviderUrl { .. }));
    }
}
