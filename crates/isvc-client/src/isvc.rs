use std::path::PathBuf;

use api_types::InferenceService;
use error_stack::Report;
use error_stack::ResultExt;
use kube::api::DeleteParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::config::WaitConfig;
use crate::error::KubernetesError;
use crate::kube_client;

/// Result of a best-effort delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The API server accepted the deletion.
    Deleted,
    /// Nothing to delete.
    AlreadyAbsent,
}

/// Submits, inspects and removes inference services.
///
/// Every operation is a single request (or a bounded sequence of requests for
/// the waits) against the API server; reconciliation is left to the serving
/// control plane.
#[derive(Clone)]
pub struct InferenceServiceClient {
    client: Client,
}

impl InferenceServiceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using `kubeconfig`, or the inferred configuration when `None`.
    pub async fn connect(kubeconfig: Option<PathBuf>) -> Result<Self, Report<KubernetesError>> {
        let client = kube_client::init_kube_client(kubeconfig).await?;
        Ok(Self::new(client))
    }

    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn api(&self, namespace: &str) -> Api<InferenceService> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Submit `isvc` to its namespace (the client default when unset).
    #[tracing::instrument(skip(self, isvc), fields(name = ?isvc.metadata.name, namespace = ?isvc.metadata.namespace))]
    pub async fn create(
        &self,
        isvc: &InferenceService,
    ) -> Result<InferenceService, Report<KubernetesError>> {
        let namespace = isvc
            .metadata
            .namespace
            .as_deref()
            .unwrap_or(self.client.default_namespace());
        let name = isvc.metadata.name.as_deref().unwrap_or_default();

        let created = self
            .api(namespace)
            .create(&PostParams::default(), isvc)
            .await
            .change_context(KubernetesError::RequestFailed {
                message: format!("create InferenceService {namespace}/{name}"),
            })?;

        info!(
            framework = created.spec.default.predictor.framework().unwrap_or("none"),
            "InferenceService created"
        );
        Ok(created)
    }

    /// Fetch the current state of `name`.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::NotFound`] if the service does not exist
    /// - [`KubernetesError::RequestFailed`] on any other API failure
    pub async fn get(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<InferenceService, Report<KubernetesError>> {
        self.get_opt(name, namespace)
            .await?
            .ok_or_else(|| {
                Report::new(KubernetesError::NotFound {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                })
            })
    }

    async fn get_opt(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<InferenceService>, Report<KubernetesError>> {
        self.api(namespace)
            .get_opt(name)
            .await
            .change_context(KubernetesError::RequestFailed {
                message: format!("get InferenceService {namespace}/{name}"),
            })
    }

    /// Whether `name` currently reports ready. A missing service is not ready.
    pub async fn is_ready(&self, name: &str, namespace: &str) -> Result<bool, Report<KubernetesError>> {
        Ok(self
            .get_opt(name, namespace)
            .await?
            .map(|isvc| isvc.is_ready())
            .unwrap_or(false))
    }

    /// Poll `name` until it reports ready or `config.timeout` passes.
    ///
    /// A service that does not exist yet counts as not ready. API failures are
    /// returned immediately.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::NotReady`] on timeout, with the last observed
    ///   object attached
    /// - [`KubernetesError::RequestFailed`] if a poll fails
    #[tracing::instrument(skip(self, config), fields(timeout = ?config.timeout))]
    pub async fn wait_ready(
        &self,
        name: &str,
        namespace: &str,
        config: &WaitConfig,
    ) -> Result<InferenceService, Report<KubernetesError>> {
        let start = Instant::now();
        let mut last_seen = None;

        loop {
            match self.get_opt(name, namespace).await? {
                Some(isvc) if isvc.is_ready() => {
                    info!(elapsed = ?start.elapsed(), url = ?isvc.url(), "InferenceService ready");
                    return Ok(isvc);
                }
                Some(isvc) => {
                    debug!("InferenceService not ready yet");
                    last_seen = Some(isvc);
                }
                None => debug!("InferenceService not found yet"),
            }

            let elapsed = start.elapsed();
            if elapsed >= config.timeout {
                break;
            }
            sleep(config.poll_interval.min(config.timeout - elapsed)).await;
        }

        let mut report = Report::new(KubernetesError::NotReady {
            name: name.to_string(),
            namespace: namespace.to_string(),
            seconds: config.timeout.as_secs(),
        });
        if let Some(yaml) = last_seen.and_then(|isvc| serde_yaml::to_string(&isvc).ok()) {
            report = report.attach_printable(format!("last observed state:\n{yaml}"));
        }
        Err(report)
    }

    /// Request deletion of `name` without waiting for it to go away.
    ///
    /// Deleting a service that does not exist succeeds with
    /// [`DeleteOutcome::AlreadyAbsent`].
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeleteOutcome, Report<KubernetesError>> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("InferenceService deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(kube::Error::Api(response)) if response.code == 404 => {
                info!("InferenceService already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(Report::new(e).change_context(KubernetesError::RequestFailed {
                message: format!("delete InferenceService {namespace}/{name}"),
            })),
        }
    }
}
