//! Request/response logging through a message-dumper sink.
//!
//! Deploys an event-display service and a flowers classifier whose logger
//! points at it, sends one valid and one invalid prediction, and checks that
//! the corresponding cloud events land in the dumper's pod logs.

use std::path::PathBuf;

use isvc_client::load_payload;
use isvc_client::DeleteOutcome;
use isvc_client::InferenceServiceClient;
use isvc_client::KubernetesError;
use isvc_client::PredictClient;
use isvc_client::PredictConfig;
use isvc_client::PredictError;
use isvc_client::WaitConfig;
use serde_json::Value;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::E2eError;
use crate::scenario::specs::message_dumper_spec;
use crate::scenario::specs::tensorflow_spec;
use crate::scenario::specs::MESSAGE_DUMPER;
use crate::scenario::specs::PREDICTOR_CONTAINER;
use crate::scenario::specs::TENSORFLOW_SERVICE;

pub const VALID_INPUT: &str = "flower_input.json";
pub const INVALID_INPUT: &str = "flower_input_invalid.json";
pub const REQUEST_EVENT: &str = "org.kubeflow.serving.inference.request";
pub const RESPONSE_EVENT: &str = "org.kubeflow.serving.inference.response";
/// Printed by the predictor for a payload without `instances`/`inputs`.
pub const MISSING_INPUT_MARKER: &str = "Missing";

#[derive(Debug, Clone)]
pub struct LoggerScenarioConfig {
    pub namespace: String,
    /// directory holding the two payload fixtures
    pub data_dir: PathBuf,
    pub ready: WaitConfig,
    pub logs: WaitConfig,
    pub expected_class: usize,
    pub predict: PredictConfig,
}

/// What a successful run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerReport {
    pub top_class: usize,
    /// whether the classifier reported ready within the wait budget
    pub classifier_ready: bool,
    /// dumper log after the invalid request
    pub dumper_log: String,
}

pub struct LoggerScenario {
    isvc: InferenceServiceClient,
    predict: PredictClient,
    config: LoggerScenarioConfig,
}

impl LoggerScenario {
    pub fn new(
        isvc: InferenceServiceClient,
        config: LoggerScenarioConfig,
    ) -> Result<Self, E2eError> {
        let predict =
            PredictClient::new(isvc.clone(), config.predict.clone()).map_err(E2eError::Predict)?;
        Ok(Self {
            isvc,
            predict,
            config,
        })
    }

    /// Run every step, then delete the services this run created.
    ///
    /// Teardown runs on failure too; the scenario error wins over a teardown
    /// error. Services that already existed are left alone.
    #[tracing::instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub async fn run(&self) -> Result<LoggerReport, E2eError> {
        let valid = load_payload(&self.config.data_dir.join(VALID_INPUT))
            .map_err(E2eError::Fixture)?;
        let invalid = load_payload(&self.config.data_dir.join(INVALID_INPUT))
            .map_err(E2eError::Fixture)?;

        let mut created = Vec::new();
        let outcome = self.exercise(&valid, &invalid, &mut created).await;
        if let Err(e) = &outcome {
            error!("logger scenario failed: {e}");
        }
        let teardown = delete_services(&self.isvc, &self.config.namespace, &created).await;

        let report = outcome?;
        teardown?;
        info!(top_class = report.top_class, "logger scenario passed");
        Ok(report)
    }

    async fn exercise(
        &self,
        valid: &Value,
        invalid: &Value,
        created: &mut Vec<&'static str>,
    ) -> Result<LoggerReport, E2eError> {
        let namespace = self.config.namespace.as_str();

        self.isvc
            .create(&message_dumper_spec(namespace))
            .await
            .map_err(E2eError::Cluster)?;
        created.push(MESSAGE_DUMPER);
        self.isvc
            .wait_ready(MESSAGE_DUMPER, namespace, &self.config.ready)
            .await
            .map_err(E2eError::Cluster)?;

        self.isvc
            .create(&tensorflow_spec(namespace, MESSAGE_DUMPER))
            .await
            .map_err(E2eError::Cluster)?;
        created.push(TENSORFLOW_SERVICE);
        // only a readiness timeout is survivable; API failures abort the run
        let classifier_ready = match self
            .isvc
            .wait_ready(TENSORFLOW_SERVICE, namespace, &self.config.ready)
            .await
        {
            Ok(_) => true,
            Err(e) if matches!(e.current_context(), KubernetesError::NotReady { .. }) => {
                warn!("{TENSORFLOW_SERVICE} not ready, dumping pods and continuing: {e:?}");
                self.isvc.dump_pods(TENSORFLOW_SERVICE, namespace).await;
                false
            }
            Err(e) => return Err(E2eError::Cluster(e)),
        };

        let result = self
            .predict
            .predict(TENSORFLOW_SERVICE, namespace, valid)
            .await
            .map_err(E2eError::Predict)?;
        let top_class = result.top_class().ok_or(E2eError::EmptyPrediction)?;
        if top_class != self.config.expected_class {
            return Err(E2eError::UnexpectedClass {
                expected: self.config.expected_class,
                actual: top_class,
            });
        }

        self.wait_for_dumper(&[REQUEST_EVENT, RESPONSE_EVENT]).await?;

        match self.predict.predict(TENSORFLOW_SERVICE, namespace, invalid).await {
            Err(e) if matches!(e.current_context(), PredictError::Rejected { .. }) => {
                info!("invalid payload rejected: {}", e.current_context());
            }
            Err(e) => return Err(E2eError::Predict(e)),
            Ok(result) => warn!(?result, "invalid payload was accepted"),
        }
        let dumper_log = self.wait_for_dumper(&[MISSING_INPUT_MARKER]).await?;

        Ok(LoggerReport {
            top_class,
            classifier_ready,
            dumper_log,
        })
    }

    async fn wait_for_dumper(&self, markers: &[&str]) -> Result<String, E2eError> {
        self.isvc
            .wait_for_log_markers(
                MESSAGE_DUMPER,
                &self.config.namespace,
                PREDICTOR_CONTAINER,
                markers,
                &self.config.logs,
            )
            .await
            .map_err(E2eError::LogMarkers)
    }
}

/// Best-effort removal of every service the scenario creates, whoever created
/// them. Recovery after an aborted run.
pub async fn teardown(isvc: &InferenceServiceClient, namespace: &str) -> Result<(), E2eError> {
    delete_services(isvc, namespace, &[MESSAGE_DUMPER, TENSORFLOW_SERVICE]).await
}

/// Delete `names` in reverse creation order without waiting for them to go
/// away. Every deletion is attempted; the first failure is returned.
async fn delete_services(
    isvc: &InferenceServiceClient,
    namespace: &str,
    names: &[&str],
) -> Result<(), E2eError> {
    let mut first_error = None;
    for &name in names.iter().rev() {
        match isvc.delete(name, namespace).await {
            Ok(DeleteOutcome::Deleted) => info!(%name, "deleted"),
            Ok(DeleteOutcome::AlreadyAbsent) => info!(%name, "nothing to delete"),
            Err(e) => {
                error!(%name, "delete failed: {e:?}");
                first_error.get_or_insert(E2eError::Cluster(e));
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}
