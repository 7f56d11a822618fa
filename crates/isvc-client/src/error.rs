//! Error types for the inference-service client.

use core::error::Error;

/// Errors that can occur while talking to the Kubernetes API.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Kubernetes API request failed: {message}")]
    RequestFailed { message: String },
    #[display("InferenceService {name} not found in namespace {namespace}")]
    NotFound { name: String, namespace: String },
    #[display("InferenceService {name} in namespace {namespace} not ready after {seconds}s")]
    NotReady {
        name: String,
        namespace: String,
        seconds: u64,
    },
    #[display("Log markers not observed: {missing}")]
    LogMarkersMissing { missing: String },
}

impl Error for KubernetesError {}

/// Errors that can occur while sending a prediction request.
#[derive(Debug, derive_more::Display)]
pub enum PredictError {
    #[display("Failed to resolve predict endpoint: {message}")]
    Endpoint { message: String },
    #[display("Failed to load payload: {message}")]
    Payload { message: String },
    #[display("Network error: {message}")]
    Network { message: String },
    #[display("Prediction rejected: {status} - {body}")]
    Rejected { status: u16, body: String },
    #[display("Invalid prediction response: {message}")]
    InvalidResponse { message: String },
}

impl Error for PredictError {}
