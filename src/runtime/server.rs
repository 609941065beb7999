//! Federation gateway HTTP server.

use crate::error::{FederationError, Result};
use crate::function::{request_to_summary, CreateFunctionRequest, DeleteFunctionRequest};
use crate::http::{GatewayResponse, ProviderClient};
use crate::routing::services::{read_services, reconcile, spawn_refresh};
use crate::routing::{DefaultProviderRouting, ProviderDirectory, ProviderLookup};
use crate::runtime::FederationConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use url::Url;

/// Shared state of every connection.
struct GatewayState {
    config: FederationConfig,
    lookup: Arc<dyn ProviderLookup>,
    providers: Vec<Url>,
    default_provider: Url,
    proxy: ProviderClient,
    aggregator: ProviderClient,
}

/// A buffered inbound request.
struct Inbound {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

/// Body of `GET /system/info`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse<'a> {
    provider: &'static str,
    orchestration: &'static str,
    version: VersionInfo,
    providers: Vec<&'a str>,
    default_provider: &'a str,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    release: &'static str,
}

/// Federation gateway server.
///
/// Resolves the provider owning each function and forwards the request
/// there, recording deployed functions as they pass through.
pub struct FederationServer {
    state: Arc<GatewayState>,
}

impl FederationServer {
    /// Build the provider directory from `config` and create the server.
    ///
    /// Fails when no provider is configured or a provider URL is malformed.
    pub fn new(config: FederationConfig) -> Result<Self> {
        let directory = Arc::new(ProviderDirectory::new(
            config.providers.as_slice(),
            &config.default_provider,
        )?);
        if directory.is_empty() {
            return Err(FederationError::InvalidConfig(
                "at least one provider is required".into(),
            ));
        }
        info!(
            "Routing across {} providers, default provider {}",
            directory.len(),
            directory.default_provider()
        );

        let lookup = Arc::new(DefaultProviderRouting::new(directory.clone()));
        Ok(Self::with_lookup(config, &directory, lookup))
    }

    /// Create a server around an existing lookup.
    pub fn with_lookup(
        config: FederationConfig,
        directory: &ProviderDirectory,
        lookup: Arc<dyn ProviderLookup>,
    ) -> Self {
        let state = GatewayState {
            providers: directory.urls().to_vec(),
            default_provider: directory.default_provider().clone(),
            proxy: ProviderClient::new(config.read_timeout),
            aggregator: ProviderClient::new(config.fetch_timeout),
            lookup,
            config,
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// The lookup requests are resolved against.
    pub fn lookup(&self) -> Arc<dyn ProviderLookup> {
        self.state.lookup.clone()
    }

    /// Bind to the configured address and serve until an accept error.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .state
            .config
            .bind_addr()
            .parse()
            .map_err(|e| FederationError::InvalidConfig(format!("bind address: {}", e)))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("Federation gateway listening on {}", listener.local_addr()?);

        let state = self.state;
        let _refresh = state.config.refresh_interval.map(|every| {
            RefreshGuard(spawn_refresh(
                state.lookup.clone(),
                state.aggregator.clone(),
                state.providers.clone(),
                every,
            ))
        });
        if state.config.refresh_interval.is_none() {
            if let Err(e) =
                reconcile(state.lookup.as_ref(), &state.aggregator, &state.providers).await
            {
                warn!("Initial function list refresh failed: {}", e);
            }
        }

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let state = state.clone();

            tokio::task::spawn(async move {
                let read_timeout = state.config.read_timeout;
                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { handle_request(req, state, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new()
                    .timer(TokioTimer::new())
                    .header_read_timeout(read_timeout)
                    .serve_connection(io, service)
                    .await
                {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

/// Aborts the refresh task when the server stops.
struct RefreshGuard(tokio::task::JoinHandle<()>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    debug!("Handling request: {} {} from {}", req.method(), req.uri(), remote_addr);

    let inbound = match read_inbound(req, state.config.max_body_size).await {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!("Failed to read request: {}", e);
            return Ok(GatewayResponse::from(e).into_hyper());
        }
    };

    let response = match tokio::time::timeout(state.config.write_timeout, dispatch(inbound, &state))
        .await
    {
        Ok(response) => response,
        Err(_) => GatewayResponse::error(504, "request timed out"),
    };

    Ok(response.into_hyper())
}

async fn read_inbound(req: Request<Incoming>, max_body_size: usize) -> Result<Inbound> {
    let (parts, body) = req.into_parts();
    let body = Limited::new(body, max_body_size)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                FederationError::PayloadTooLarge(max_body_size)
            } else {
                FederationError::BadRequest(e.to_string())
            }
        })?
        .to_bytes();

    Ok(Inbound {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        headers: parts.headers,
        body,
    })
}

async fn dispatch(inbound: Inbound, state: &Arc<GatewayState>) -> GatewayResponse {
    let path = inbound.path.clone();

    let result = match (inbound.method.clone(), path.as_str()) {
        (Method::GET, "/healthz") => Ok(GatewayResponse::text("OK")),
        (Method::GET, "/system/info") => system_info(state),
        (Method::GET, "/system/functions") => list_functions(state).await,
        (Method::POST, "/system/functions") | (Method::PUT, "/system/functions") => {
            deploy_function(inbound, state).await
        }
        (Method::DELETE, "/system/functions") => delete_function(inbound, state).await,
        (Method::GET, p) if p.starts_with("/system/function/") => {
            function_status(&p["/system/function/".len()..], state).await
        }
        (Method::POST, p) if p.starts_with(SCALE_PREFIX) => {
            let name = p[SCALE_PREFIX.len()..].split('/').next().unwrap_or_default();
            proxy_function(name, inbound, state).await
        }
        (_, p) => match function_name(p) {
            Some(name) => proxy_function(&name, inbound, state).await,
            None => Ok(GatewayResponse::error(404, "Not Found")),
        },
    };

    result.unwrap_or_else(|e| {
        if !matches!(e, FederationError::FunctionNotFound(_)) {
            error!("{} failed with {}: {}", path, e.status_code(), e);
        }
        e.into()
    })
}

const SCALE_PREFIX: &str = "/system/scale-function/";

/// Function name from `/function/{name}/..` or `/async-function/{name}/..`.
pub fn function_name(path: &str) -> Option<String> {
    let rest = path
        .strip_prefix("/function/")
        .or_else(|| path.strip_prefix("/async-function/"))?;
    let name = rest.split('/').next().unwrap_or_default();
    (!name.is_empty()).then(|| name.to_string())
}

async fn list_functions(state: &GatewayState) -> Result<GatewayResponse> {
    let summaries = match read_services(&state.aggregator, &state.providers).await {
        Ok(services) => services.functions(),
        Err(e) => {
            warn!("Listing from providers failed, answering from cache: {}", e);
            state
                .lookup
                .get_functions()
                .await
                .iter()
                .map(request_to_summary)
                .collect()
        }
    };

    Ok(GatewayResponse::json(&summaries)?)
}

fn system_info(state: &GatewayState) -> Result<GatewayResponse> {
    let info = InfoResponse {
        provider: "faas-federation",
        orchestration: "federation",
        version: VersionInfo {
            release: env!("CARGO_PKG_VERSION"),
        },
        providers: state.providers.iter().map(Url::as_str).collect(),
        default_provider: state.default_provider.as_str(),
    };
    Ok(GatewayResponse::json(&info)?)
}

async fn function_status(name: &str, state: &GatewayState) -> Result<GatewayResponse> {
    let descriptor = state
        .lookup
        .get_function(name)
        .await
        .ok_or_else(|| FederationError::FunctionNotFound(name.to_string()))?;

    Ok(GatewayResponse::json(&request_to_summary(&descriptor))?)
}

async fn deploy_function(inbound: Inbound, state: &Arc<GatewayState>) -> Result<GatewayResponse> {
    let request: CreateFunctionRequest = serde_json::from_slice(&inbound.body)
        .map_err(|e| FederationError::BadRequest(e.to_string()))?;
    if request.service.is_empty() {
        return Err(FederationError::BadRequest("service is required".into()));
    }

    // detached so the rollback still runs if the write timeout fires
    let state = state.clone();
    let task = tokio::spawn(async move {
        let written = request.clone();
        let previous = state.lookup.add_function(request).await;

        let outcome = match state.lookup.resolve(&written.service).await {
            Ok(provider) => forward(&provider, inbound, &state).await,
            Err(e) => Err(e),
        };

        let accepted = matches!(&outcome, Ok(response) if response.status < 400);
        if !accepted && state.lookup.restore_function(&written, previous).await {
            info!("Deploy of {} rejected, registry entry restored", written.service);
        }
        outcome
    });

    task.await?
}

async fn delete_function(inbound: Inbound, state: &GatewayState) -> Result<GatewayResponse> {
    let request: DeleteFunctionRequest = serde_json::from_slice(&inbound.body)
        .map_err(|e| FederationError::BadRequest(e.to_string()))?;

    let provider = state.lookup.resolve(&request.function_name).await?;
    let response = forward(&provider, inbound, state).await?;

    if response.status < 300 {
        state.lookup.remove_function(&request.function_name).await;
        info!("Deleted function: {}", request.function_name);
    }

    Ok(response)
}

async fn proxy_function(
    name: &str,
    inbound: Inbound,
    state: &GatewayState,
) -> Result<GatewayResponse> {
    let provider = state.lookup.resolve(name).await?;
    forward(&provider, inbound, state).await
}

async fn forward(
    provider: &Url,
    inbound: Inbound,
    state: &GatewayState,
) -> Result<GatewayResponse> {
    let target = target_url(provider, &inbound.path, inbound.query.as_deref());
    let response = state
        .proxy
        .send(inbound.method, &target, &inbound.headers, inbound.body)
        .await?;
    Ok(response.into())
}

/// Provider URL with the inbound path and query applied.
pub fn target_url(provider: &Url, path: &str, query: Option<&str>) -> Url {
    let mut target = provider.clone();
    target.set_path(path);
    target.set_query(query);
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_name() {
        assert_eq!(function_name("/function/echo"), Some("echo".to_string()));
        assert_eq!(
            function_name("/function/echo/sub/path"),
            Some("echo".to_string())
        );
        assert_eq!(
            function_name("/async-function/echo"),
            Some("echo".to_string())
        );
        assert_eq!(function_name("/function/"), None);
        assert_eq!(function_name("/other/echo"), None);
    }

    #[test]
    fn test_target_url_keeps_provider_host() {
        let provider = Url::parse("http://p2:8080").unwrap();
        let target = target_url(&provider, "/function/echo", Some("a=1"));
        assert_eq!(target.as_str(), "http://p2:8080/function/echo?a=1");
    }

    #[test]
    fn test_server_requires_a_provider() {
        let config = FederationConfig::new().default_provider("http://p1:8080");
        let err = FederationServer::new(config).err().unwrap();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("provider"));
    }

    #[test]
    fn test_server_rejects_bad_provider_url() {
        let config = FederationConfig::new()
            .provider("not a url")
            .default_provider("http://p1:8080");
        assert!(FederationServer::new(config).is_err());
    }
}
