//! Error type shared by the federation core and the gateway plumbing.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FederationError>;

/// Errors raised while resolving, aggregating or forwarding function calls.
#[derive(Debug, Error)]
pub enum FederationError {
    /// A provider or default provider URL could not be parsed.
    #[error("error parsing URL using value {value}: {source}")]
    InvalidProviderUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    /// A provider URL uses a scheme the gateway client cannot speak.
    #[error("unsupported scheme {scheme} in provider URL {value}, only http is supported")]
    UnsupportedScheme { value: String, scheme: String },

    /// Any other configuration problem detected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The function is not present in the registry.
    #[error("can not find function {0} in cache map")]
    FunctionNotFound(String),

    /// A provider could not be reached.
    #[error("error contacting provider {provider}: {message}")]
    Transport { provider: String, message: String },

    /// A provider answered with an error status.
    #[error("unexpected status code {status} from provider {provider}")]
    ProviderStatus { provider: String, status: u16 },

    /// A provider returned a body that is not a function list.
    #[error("error unmarshalling response for {provider}: {source}")]
    Decode {
        provider: String,
        #[source]
        source: serde_json::Error,
    },

    /// The inbound request could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The inbound request body exceeds the configured limit.
    #[error("request body larger than {0} bytes")]
    PayloadTooLarge(usize),

    /// A spawned request task panicked or was cancelled.
    #[error("request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A gateway response could not be serialized.
    #[error("error encoding response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FederationError {
    /// HTTP status code the gateway answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            FederationError::FunctionNotFound(_) => 404,
            FederationError::BadRequest(_) => 400,
            FederationError::PayloadTooLarge(_) => 413,
            FederationError::Transport { .. }
            | FederationError::ProviderStatus { .. }
            | FederationError::Decode { .. } => 502,
            FederationError::InvalidProviderUrl { .. }
            | FederationError::UnsupportedScheme { .. }
            | FederationError::InvalidConfig(_)
            | FederationError::Task(_)
            | FederationError::Encode(_)
            | FederationError::Io(_) => 500,
        }
    }

    /// Whether the error only affects a single provider during aggregation.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            FederationError::Transport { .. } | FederationError::ProviderStatus { .. }
        )
    }
}
