use std::borrow::Cow;

use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use serde::Deserialize;
use serde::Serialize;

/// API group of the serving control plane.
pub const SERVING_GROUP: &str = "serving.kubeflow.org";
/// API version of the inference service resource.
pub const SERVING_VERSION: &str = "v1alpha2";
/// Label the control plane puts on every pod backing an inference service.
pub const INFERENCE_SERVICE_LABEL: &str = "serving.kubeflow.org/inferenceservice";

const KIND: &str = "InferenceService";
const PLURAL: &str = "inferenceservices";

/// A deployed model-serving endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceService {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: InferenceServiceSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InferenceServiceStatus>,
}

fn default_api_version() -> String {
    format!("{SERVING_GROUP}/{SERVING_VERSION}")
}

fn default_kind() -> String {
    KIND.to_string()
}

impl InferenceService {
    pub fn new(name: &str, namespace: &str, spec: InferenceServiceSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    /// Returns `true` once the control plane reports a `Ready` condition with
    /// status `"True"`.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|status| {
                status
                    .conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false)
    }

    /// External URL reported by the control plane, if any.
    pub fn url(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.url.as_deref())
    }

    /// Label selector matching the pods that back this service.
    pub fn label_selector(&self) -> String {
        label_selector_for(self.metadata.name.as_deref().unwrap_or_default())
    }
}

/// Label selector matching the pods of the inference service `name`.
pub fn label_selector_for(name: &str) -> String {
    format!("{INFERENCE_SERVICE_LABEL}={name}")
}

impl kube::Resource for InferenceService {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn group(_dt: &()) -> Cow<'_, str> {
        SERVING_GROUP.into()
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        SERVING_VERSION.into()
    }

    fn kind(_dt: &()) -> Cow<'_, str> {
        KIND.into()
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        PLURAL.into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceSpec {
    pub default: EndpointSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<EndpointSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary_traffic_percent: Option<i32>,
}

impl InferenceServiceSpec {
    pub fn with_predictor(predictor: PredictorSpec) -> Self {
        Self {
            default: EndpointSpec { predictor },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub predictor: PredictorSpec,
}

/// The model runtime serving predictions.
///
/// At most one framework field is expected to be set; `custom` carries an
/// arbitrary container instead of a model runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<LoggerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tensorflow: Option<FrameworkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sklearn: Option<FrameworkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xgboost: Option<FrameworkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pytorch: Option<PyTorchSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onnx: Option<FrameworkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triton: Option<FrameworkSpec>,
}

impl PredictorSpec {
    /// Name of the declared runtime, `None` if nothing is declared.
    pub fn framework(&self) -> Option<&'static str> {
        if self.custom.is_some() {
            Some("custom")
        } else if self.tensorflow.is_some() {
            Some("tensorflow")
        } else if self.sklearn.is_some() {
            Some("sklearn")
        } else if self.xgboost.is_some() {
            Some("xgboost")
        } else if self.pytorch.is_some() {
            Some("pytorch")
        } else if self.onnx.is_some() {
            Some("onnx")
        } else if self.triton.is_some() {
            Some("triton")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomSpec {
    pub container: Container,
}

/// Model-server runtime loading a model from `storage_uri`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkSpec {
    pub storage_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyTorchSpec {
    pub storage_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Forwards inference request/response events to `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub mode: LoggerMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerMode {
    #[default]
    All,
    Request,
    Response,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary_traffic: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use kube::Resource;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn with_conditions(conditions: Vec<Condition>) -> InferenceService {
        let mut isvc = InferenceService::new("svc", "ns", InferenceServiceSpec::default());
        isvc.status = Some(InferenceServiceStatus {
            url: Some("http://svc.ns.example.com".to_string()),
            conditions,
            ..Default::default()
        });
        isvc
    }

    fn condition(type_: &str, status: &str) -> Condition {
        Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn resource_identity() {
        assert_eq!(InferenceService::api_version(&()).as_ref(), "serving.kubeflow.org/v1alpha2");
        assert_eq!(InferenceService::plural(&()).as_ref(), "inferenceservices");
        assert_eq!(InferenceService::kind(&()).as_ref(), "InferenceService");
    }

    #[test]
    fn serializes_in_api_server_shape() {
        let predictor = PredictorSpec {
            min_replicas: Some(1),
            logger: Some(LoggerSpec {
                url: Some("http://message-dumper.ns.svc.cluster.local".to_string()),
                mode: LoggerMode::All,
            }),
            tensorflow: Some(FrameworkSpec {
                storage_uri: "gs://bucket/model".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let isvc = InferenceService::new(
            "isvc-tensorflow",
            "ns",
            InferenceServiceSpec::with_predictor(predictor),
        );

        let value = serde_json::to_value(&isvc).expect("serialize");
        assert_eq!(
            value,
            json!({
                "apiVersion": "serving.kubeflow.org/v1alpha2",
                "kind": "InferenceService",
                "metadata": { "name": "isvc-tensorflow", "namespace": "ns" },
                "spec": {
                    "default": {
                        "predictor": {
                            "minReplicas": 1,
                            "logger": {
                                "url": "http://message-dumper.ns.svc.cluster.local",
                                "mode": "all"
                            },
                            "tensorflow": { "storageUri": "gs://bucket/model" }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn ready_requires_true_ready_condition() {
        assert!(!InferenceService::new("svc", "ns", InferenceServiceSpec::default()).is_ready());
        assert!(!with_conditions(vec![]).is_ready());
        assert!(!with_conditions(vec![condition("Ready", "False")]).is_ready());
        assert!(!with_conditions(vec![condition("PredictorReady", "True")]).is_ready());
        assert!(with_conditions(vec![
            condition("PredictorReady", "True"),
            condition("Ready", "True"),
        ])
        .is_ready());
    }

    #[test]
    fn deserializes_status_from_control_plane() {
        let isvc: InferenceService = serde_json::from_value(json!({
            "apiVersion": "serving.kubeflow.org/v1alpha2",
            "kind": "InferenceService",
            "metadata": { "name": "svc", "namespace": "ns" },
            "spec": { "default": { "predictor": { "sklearn": { "storageUri": "gs://m" } } } },
            "status": {
                "url": "http://svc.ns.example.com",
                "traffic": 100,
                "conditions": [
                    { "type": "Ready", "status": "True", "lastTransitionTime": "2020-01-01T00:00:00Z" }
                ]
            }
        }))
        .expect("deserialize");

        assert!(isvc.is_ready());
        assert_eq!(isvc.url(), Some("http://svc.ns.example.com"));
        assert_eq!(isvc.spec.default.predictor.framework(), Some("sklearn"));
        assert_eq!(
            isvc.label_selector(),
            "serving.kubeflow.org/inferenceservice=svc"
        );
    }

    #[test]
    fn logger_mode_defaults_to_all() {
        let logger: LoggerSpec = serde_json::from_value(json!({ "url": "http://x" })).expect("logger");
        assert_eq!(logger.mode, LoggerMode::All);
        let logger: LoggerSpec =
            serde_json::from_value(json!({ "mode": "response" })).expect("logger");
        assert_eq!(logger.mode, LoggerMode::Response);
    }

    #[test]
    fn framework_is_none_without_runtime() {
        assert_eq!(PredictorSpec::default().framework(), None);
    }
}
