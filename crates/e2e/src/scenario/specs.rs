//! Inference services deployed by the logger scenario.

use std::collections::BTreeMap;

use api_types::CustomSpec;
use api_types::FrameworkSpec;
use api_types::InferenceService;
use api_types::InferenceServiceSpec;
use api_types::LoggerMode;
use api_types::LoggerSpec;
use api_types::PredictorSpec;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

pub const MESSAGE_DUMPER: &str = "message-dumper";
pub const TENSORFLOW_SERVICE: &str = "isvc-tensorflow";
/// Container name shared by every predictor pod.
pub const PREDICTOR_CONTAINER: &str = "kfserving-container";
pub const EVENT_DISPLAY_IMAGE: &str =
    "gcr.io/knative-releases/knative.dev/eventing-contrib/cmd/event_display";
pub const FLOWERS_STORAGE_URI: &str = "gs://kfserving-samples/models/tensorflow/flowers";

/// In-cluster address of service `name`.
pub fn cluster_local_url(name: &str, namespace: &str) -> String {
    format!("http://{name}.{namespace}.svc.cluster.local")
}

/// Event sink: a custom container printing every cloud event it receives.
pub fn message_dumper_spec(namespace: &str) -> InferenceService {
    let predictor = PredictorSpec {
        min_replicas: Some(1),
        custom: Some(CustomSpec {
            container: Container {
                name: PREDICTOR_CONTAINER.to_string(),
                image: Some(EVENT_DISPLAY_IMAGE.to_string()),
                ..Default::default()
            },
        }),
        ..Default::default()
    };
    InferenceService::new(
        MESSAGE_DUMPER,
        namespace,
        InferenceServiceSpec::with_predictor(predictor),
    )
}

/// Flowers classifier whose requests and responses are logged to `sink`.
pub fn tensorflow_spec(namespace: &str, sink: &str) -> InferenceService {
    let quantities = BTreeMap::from([
        ("cpu".to_string(), Quantity("1".to_string())),
        ("memory".to_string(), Quantity("2Gi".to_string())),
    ]);
    let predictor = PredictorSpec {
        min_replicas: Some(1),
        logger: Some(LoggerSpec {
            url: Some(cluster_local_url(sink, namespace)),
            mode: LoggerMode::All,
        }),
        tensorflow: Some(FrameworkSpec {
            storage_uri: FLOWERS_STORAGE_URI.to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(quantities.clone()),
                limits: Some(quantities),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    InferenceService::new(
        TENSORFLOW_SERVICE,
        namespace,
        InferenceServiceSpec::with_predictor(predictor),
    )
}
