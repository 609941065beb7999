//! Function descriptors exchanged with providers.
//!
//! Two shapes exist on the wire: the deploy/update payload a client sends
//! (`CreateFunctionRequest`) and the summary a provider lists under
//! `/system/functions` (`FunctionSummary`). The registry stores the former.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Replica count reported for functions the federation lists itself.
///
/// The owning provider tracks live replicas; the federation does not.
pub const FEDERATED_REPLICAS: u64 = 1;

/// A function as known to the federation, keyed by `service`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunctionRequest {
    /// Function name.
    pub service: String,
    /// Fully-qualified container image.
    #[serde(default)]
    pub image: String,
    /// Overrides the fprocess environment variable of the watchdog.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env_process: String,
    /// Labels used by providers and the gateway.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    /// Annotations; carries the provider affinity constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

/// Stored form of a function inside the registry.
pub type FunctionDescriptor = CreateFunctionRequest;

impl CreateFunctionRequest {
    /// Create a descriptor for the given function name and image.
    pub fn new(service: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// Set the environment process.
    pub fn with_env_process(mut self, env_process: impl Into<String>) -> Self {
        self.env_process = env_process.into();
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation, creating the annotation map if needed.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}

/// Outward-facing function summary, as listed by providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub invocation_count: f64,
    #[serde(default)]
    pub replicas: u64,
    #[serde(default)]
    pub available_replicas: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env_process: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

/// Convert a deploy request into the summary the federation reports.
pub fn request_to_summary(request: &CreateFunctionRequest) -> FunctionSummary {
    FunctionSummary {
        name: request.service.clone(),
        image: request.image.clone(),
        invocation_count: 0.0,
        replicas: FEDERATED_REPLICAS,
        available_replicas: FEDERATED_REPLICAS,
        env_process: request.env_process.clone(),
        labels: request.labels.clone(),
        annotations: request.annotations.clone(),
    }
}

/// Convert a provider summary back into a storable descriptor.
pub fn summary_to_request(summary: &FunctionSummary) -> CreateFunctionRequest {
    CreateFunctionRequest {
        service: summary.name.clone(),
        image: summary.image.clone(),
        env_process: summary.env_process.clone(),
        labels: summary.labels.clone(),
        annotations: summary.annotations.clone(),
    }
}

impl From<&CreateFunctionRequest> for FunctionSummary {
    fn from(request: &CreateFunctionRequest) -> Self {
        request_to_summary(request)
    }
}

impl From<&FunctionSummary> for CreateFunctionRequest {
    fn from(summary: &FunctionSummary) -> Self {
        summary_to_request(summary)
    }
}

/// Payload of a function delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFunctionRequest {
    pub function_name: String,
}
