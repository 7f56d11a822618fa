//! Client for driving inference services on a Kubernetes cluster.
//!
//! The main components are:
//! - [`InferenceServiceClient`]: create, inspect, wait for and delete
//!   `serving.kubeflow.org/v1alpha2` inference services, and read the logs of
//!   the pods backing them
//! - [`PredictClient`]: send prediction payloads through the ingress gateway

pub mod config;
pub mod error;
pub mod isvc;
pub mod kube_client;
pub mod pods;
pub mod predict;

pub use config::PredictConfig;
pub use config::WaitConfig;
pub use error::KubernetesError;
pub use error::PredictError;
pub use isvc::DeleteOutcome;
pub use isvc::InferenceServiceClient;
pub use predict::load_payload;
pub use predict::PredictClient;
