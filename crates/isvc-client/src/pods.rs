//! Pods backing an inference service: selection, logs and diagnostics.

use api_types::label_selector_for;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::api::LogParams;
use kube::Api;
use kube::ResourceExt;
use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::WaitConfig;
use crate::error::KubernetesError;
use crate::isvc::InferenceServiceClient;

/// Markers from `markers` that do not occur in `log`, in order.
pub fn missing_markers<'a>(log: &str, markers: &[&'a str]) -> Vec<&'a str> {
    markers
        .iter()
        .copied()
        .filter(|marker| !log.contains(marker))
        .collect()
}

impl InferenceServiceClient {
    /// List pods in `namespace` matching `selector`.
    pub async fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Pod>, Report<KubernetesError>> {
        let api: Api<Pod> = Api::namespaced(self.kube_client().clone(), namespace);
        let pods = api
            .list(&ListParams::default().labels(selector))
            .await
            .change_context(KubernetesError::RequestFailed {
                message: format!("list pods in {namespace} with selector {selector}"),
            })?;
        Ok(pods.items)
    }

    /// Pods backing the inference service `name`.
    pub async fn isvc_pods(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Vec<Pod>, Report<KubernetesError>> {
        self.list_pods(namespace, &label_selector_for(name)).await
    }

    /// Logs of `container` in every pod of `pods`, concatenated in order.
    pub async fn collect_logs(
        &self,
        pods: &[Pod],
        container: &str,
    ) -> Result<String, Report<KubernetesError>> {
        let params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };

        let mut log = String::new();
        for pod in pods {
            let name = pod.name_any();
            let namespace = pod
                .namespace()
                .unwrap_or_else(|| self.kube_client().default_namespace().to_string());
            let api: Api<Pod> = Api::namespaced(self.kube_client().clone(), &namespace);
            let pod_log = api.logs(&name, &params).await.change_context(
                KubernetesError::RequestFailed {
                    message: format!("read log of {namespace}/{name} container {container}"),
                },
            )?;
            debug!(pod = %name, bytes = pod_log.len(), "read pod log");
            log.push_str(&pod_log);
        }
        Ok(log)
    }

    /// Re-read the logs of `container` across the pods of inference service
    /// `name` until every marker is present or `config.timeout` passes.
    ///
    /// Returns the concatenated log that satisfied the check. Failures to list
    /// or read are retried until the deadline.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::LogMarkersMissing`] naming the markers never seen
    #[tracing::instrument(skip(self, config), fields(timeout = ?config.timeout))]
    pub async fn wait_for_log_markers(
        &self,
        name: &str,
        namespace: &str,
        container: &str,
        markers: &[&str],
        config: &WaitConfig,
    ) -> Result<String, Report<KubernetesError>> {
        let start = Instant::now();
        let mut last_log = String::new();
        let mut last_error = None;

        loop {
            let attempt = match self.isvc_pods(name, namespace).await {
                Ok(pods) => self.collect_logs(&pods, container).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(log) => {
                    if missing_markers(&log, markers).is_empty() {
                        info!(elapsed = ?start.elapsed(), "all log markers observed");
                        return Ok(log);
                    }
                    last_log = log;
                }
                Err(e) => {
                    warn!("reading logs failed, retrying: {e:?}");
                    last_error = Some(e);
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= config.timeout {
                break;
            }
            sleep(config.poll_interval.min(config.timeout - elapsed)).await;
        }

        let missing = missing_markers(&last_log, markers).join(", ");
        let mut report = Report::new(KubernetesError::LogMarkersMissing { missing })
            .attach_printable(format!("last log read:\n{last_log}"));
        if let Some(e) = last_error {
            report = report.attach_printable(format!("last read failure: {e:?}"));
        }
        Err(report)
    }

    /// Print every pod of inference service `name` as YAML for diagnosis.
    ///
    /// Never fails; returns the number of pods dumped.
    pub async fn dump_pods(&self, name: &str, namespace: &str) -> usize {
        let pods = match self.isvc_pods(name, namespace).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(isvc = %name, "failed to list pods for diagnosis: {e:?}");
                return 0;
            }
        };
        if pods.is_empty() {
            warn!(isvc = %name, "no pods found for diagnosis");
        }
        for pod in &pods {
            match serde_yaml::to_string(pod) {
                Ok(yaml) => warn!(isvc = %name, pod = %pod.name_any(), "pod state:\n{yaml}"),
                Err(_) => warn!(isvc = %name, pod = %pod.name_any(), "pod state: {pod:?}"),
            }
        }
        pods.len()
    }
}
