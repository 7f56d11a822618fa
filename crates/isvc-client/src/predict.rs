//! Prediction requests routed through the cluster ingress gateway.
//!
//! Requests go to `http://<ingress>/v1/models/<service>:predict` with the
//! `Host` header set to the host of the service's status URL, which is how the
//! gateway picks the backing predictor.

use std::path::Path;

use api_types::PredictionResult;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use reqwest::header::HOST;
use tracing::debug;
use tracing::info;
use url::Url;

use crate::config::PredictConfig;
use crate::error::PredictError;
use crate::isvc::InferenceServiceClient;

/// Sends prediction payloads to inference services.
#[derive(Clone)]
pub struct PredictClient {
    isvc: InferenceServiceClient,
    http: reqwest::Client,
    config: PredictConfig,
}

impl PredictClient {
    pub fn new(
        isvc: InferenceServiceClient,
        config: PredictConfig,
    ) -> Result<Self, Report<PredictError>> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                Report::new(PredictError::Network {
                    message: format!("failed to build HTTP client: {e}"),
                })
            })?;
        Ok(Self { isvc, http, config })
    }

    pub fn config(&self) -> &PredictConfig {
        &self.config
    }

    /// Address of the ingress gateway, from config or the gateway service.
    pub async fn ingress_host(&self) -> Result<String, Report<PredictError>> {
        if let Some(host) = &self.config.ingress_host {
            return Ok(host.clone());
        }

        let namespace = &self.config.ingress_namespace;
        let name = &self.config.ingress_service;
        let api: Api<Service> = Api::namespaced(self.isvc.kube_client().clone(), namespace);
        let service = api
            .get(name)
            .await
            .change_context(PredictError::Endpoint {
                message: format!("failed to read ingress service {namespace}/{name}"),
            })?;

        ingress_address(&service).ok_or_else(|| {
            Report::new(PredictError::Endpoint {
                message: format!("ingress service {namespace}/{name} has no address"),
            })
        })
    }

    /// POST `payload` to the predictor of inference service `service`.
    ///
    /// # Errors
    ///
    /// - [`PredictError::Endpoint`] if the service or the gateway cannot be resolved
    /// - [`PredictError::Network`] if the request cannot be sent
    /// - [`PredictError::Rejected`] if the predictor answers with a non-2xx status
    /// - [`PredictError::InvalidResponse`] if a 2xx body is not a prediction
    #[tracing::instrument(skip(self, payload))]
    pub async fn predict(
        &self,
        service: &str,
        namespace: &str,
        payload: &serde_json::Value,
    ) -> Result<PredictionResult, Report<PredictError>> {
        let isvc = self
            .isvc
            .get(service, namespace)
            .await
            .change_context(PredictError::Endpoint {
                message: format!("failed to read InferenceService {namespace}/{service}"),
            })?;
        let status_url = isvc.url().ok_or_else(|| {
            Report::new(PredictError::Endpoint {
                message: format!("InferenceService {namespace}/{service} reports no URL"),
            })
        })?;
        let host = host_header(status_url)?;
        let endpoint = predict_url(&self.ingress_host().await?, service);
        debug!(%endpoint, %host, "sending prediction request");

        let response = self
            .http
            .post(&endpoint)
            .header(HOST, &host)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                Report::new(PredictError::Network {
                    message: format!("POST {endpoint}: {e}"),
                })
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Report::new(PredictError::Network {
                message: format!("reading response of {endpoint}: {e}"),
            })
        })?;

        if !status.is_success() {
            return Err(Report::new(PredictError::Rejected {
                status: status.as_u16(),
                body,
            }));
        }

        let result: PredictionResult = serde_json::from_str(&body).map_err(|e| {
            Report::new(PredictError::InvalidResponse {
                message: e.to_string(),
            })
            .attach_printable(body.clone())
        })?;
        info!(
            instances = result.predictions.len(),
            top_class = ?result.top_class(),
            "prediction received"
        );
        Ok(result)
    }
}

/// Externally reachable address of a gateway service: load-balancer hostname,
/// then load-balancer IP, then cluster IP.
pub fn ingress_address(service: &Service) -> Option<String> {
    let ingress = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first());

    if let Some(ingress) = ingress {
        if let Some(hostname) = ingress.hostname.as_ref().filter(|h| !h.is_empty()) {
            return Some(hostname.clone());
        }
        if let Some(ip) = ingress.ip.as_ref().filter(|ip| !ip.is_empty()) {
            return Some(ip.clone());
        }
    }

    service
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.clone())
        .filter(|ip| !ip.is_empty())
}

/// `host[:port]` of `url`, the value routed on by the gateway.
pub fn host_header(url: &str) -> Result<String, Report<PredictError>> {
    let parsed = Url::parse(url).map_err(|e| {
        Report::new(PredictError::Endpoint {
            message: format!("invalid service URL {url}: {e}"),
        })
    })?;
    let host = parsed.host_str().ok_or_else(|| {
        Report::new(PredictError::Endpoint {
            message: format!("service URL {url} has no host"),
        })
    })?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

pub fn predict_url(ingress: &str, service: &str) -> String {
    format!("http://{ingress}/v1/models/{service}:predict")
}

/// Read a JSON payload fixture.
pub fn load_payload(path: &Path) -> Result<serde_json::Value, Report<PredictError>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Report::new(PredictError::Payload {
            message: format!("{}: {e}", path.display()),
        })
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        Report::new(PredictError::Payload {
            message: format!("{} is not valid JSON: {e}", path.display()),
        })
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::LoadBalancerIngress;
    use k8s_openapi::api::core::v1::LoadBalancerStatus;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::api::core::v1::ServiceStatus;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn gateway(ingress: Option<LoadBalancerIngress>, cluster_ip: Option<&str>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(str::to_string),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: ingress.map(|i| vec![i]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ingress_prefers_hostname_then_ip_then_cluster_ip() {
        let both = LoadBalancerIngress {
            hostname: Some("lb.example.com".to_string()),
            ip: Some("34.1.2.3".to_string()),
            ..Default::default()
        };
        assert_eq!(
            ingress_address(&gateway(Some(both), Some("10.0.0.7"))).as_deref(),
            Some("lb.example.com")
        );

        let ip_only = LoadBalancerIngress {
            ip: Some("34.1.2.3".to_string()),
            ..Default::default()
        };
        assert_eq!(
            ingress_address(&gateway(Some(ip_only), Some("10.0.0.7"))).as_deref(),
            Some("34.1.2.3")
        );

        assert_eq!(
            ingress_address(&gateway(None, Some("10.0.0.7"))).as_deref(),
            Some("10.0.0.7")
        );
        assert_eq!(ingress_address(&gateway(None, None)), None);
    }

    #[test]
    fn host_header_keeps_explicit_port() {
        assert_eq!(
            host_header("http://isvc-tensorflow.ns.example.com").expect("host"),
            "isvc-tensorflow.ns.example.com"
        );
        assert_eq!(
            host_header("http://isvc.ns.example.com:8080/v1/models/isvc").expect("host"),
            "isvc.ns.example.com:8080"
        );
        assert!(host_header("not a url").is_err());
    }

    #[test]
    fn predict_url_targets_model_verb() {
        assert_eq!(
            predict_url("10.0.0.1:31380", "isvc-tensorflow"),
            "http://10.0.0.1:31380/v1/models/isvc-tensorflow:predict"
        );
    }

    #[test]
    fn load_payload_reads_and_validates_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("input.json");
        std::fs::write(&good, r#"{"instances": [[1.0, 2.0]]}"#).expect("write");
        let value = load_payload(&good).expect("valid payload");
        assert!(value["instances"][0][1] == 2.0);

        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, "{").expect("write");
        assert!(matches!(
            load_payload(&bad).expect_err("invalid json").current_context(),
            PredictError::Payload { .. }
        ));
        assert!(load_payload(&dir.path().join("absent.json")).is_err());
    }
}
