//! Shared API type definitions
//!
//! This crate contains the inference-serving custom resource
//! (`serving.kubeflow.org/v1alpha2` `InferenceService`) and the JSON payloads
//! exchanged with a predictor's `:predict` endpoint.

pub mod inference_service;
pub mod prediction;

pub use inference_service::Condition;
pub use inference_service::CustomSpec;
pub use inference_service::EndpointSpec;
pub use inference_service::FrameworkSpec;
pub use inference_service::InferenceService;
pub use inference_service::InferenceServiceSpec;
pub use inference_service::InferenceServiceStatus;
pub use inference_service::label_selector_for;
pub use inference_service::LoggerMode;
pub use inference_service::LoggerSpec;
pub use inference_service::PredictorSpec;
pub use inference_service::PyTorchSpec;
pub use inference_service::INFERENCE_SERVICE_LABEL;
pub use inference_service::SERVING_GROUP;
pub use inference_service::SERVING_VERSION;
pub use prediction::Prediction;
pub use prediction::PredictionResult;
