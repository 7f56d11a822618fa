use error_stack::Report;
use isvc_client::KubernetesError;
use isvc_client::PredictError;
use thiserror::Error;

/// Reasons a scenario run fails.
#[derive(Debug, Error)]
pub enum E2eError {
    #[error("Failed to load fixture: {0:?}")]
    Fixture(Report<PredictError>),
    #[error("Cluster operation failed: {0:?}")]
    Cluster(Report<KubernetesError>),
    #[error("Prediction failed: {0:?}")]
    Predict(Report<PredictError>),
    #[error("Unexpected top class: expected {expected}, got {actual}")]
    UnexpectedClass { expected: usize, actual: usize },
    #[error("Prediction response contained no scores")]
    EmptyPrediction,
    #[error("Logger events not delivered: {0:?}")]
    LogMarkers(Report<KubernetesError>),
}
