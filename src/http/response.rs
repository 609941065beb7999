//! Gateway responses and their conversion into hyper responses.

use crate::error::FederationError;
use crate::http::client::ProviderResponse;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

/// A buffered response produced by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// HTTP headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl GatewayResponse {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a plain text `200 OK` response.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(200)
            .content_type("text/plain")
            .body(content.into())
    }

    /// Create a `200 OK` response with a JSON body.
    pub fn json<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::new(200).content_type("application/json").body(body))
    }

    /// Create a plain text error response.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status)
            .content_type("text/plain")
            .body(message.into())
    }

    /// Set the content type.
    pub fn content_type(mut self, value: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(value));
        self
    }

    /// Set the response body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Convert into a hyper response.
    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            warn!(
                "Invalid status code {}, falling back to 500 Internal Server Error",
                self.status
            );
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl From<FederationError> for GatewayResponse {
    fn from(err: FederationError) -> Self {
        GatewayResponse::error(err.status_code(), err.to_string())
    }
}

impl From<ProviderResponse> for GatewayResponse {
    fn from(response: ProviderResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}
