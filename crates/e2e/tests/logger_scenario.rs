//! Logger scenario against an in-process fake cluster

use std::path::PathBuf;
use std::time::Duration;

use e2e::scenario::logger::teardown;
use e2e::scenario::logger::INVALID_INPUT;
use e2e::scenario::logger::VALID_INPUT;
use e2e::scenario::specs::message_dumper_spec;
use e2e::scenario::specs::MESSAGE_DUMPER;
use e2e::scenario::specs::TENSORFLOW_SERVICE;
use e2e::scenario::LoggerScenario;
use e2e::scenario::LoggerScenarioConfig;
use e2e::E2eError;
use fake_cluster::FakeCluster;
use isvc_client::InferenceServiceClient;
use isvc_client::KubernetesError;
use isvc_client::PredictConfig;
use isvc_client::WaitConfig;
use similar_asserts::assert_eq;
use test_log::test;

const NS: &str = "kfserving-ci-e2e-test";

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn config(cluster: &FakeCluster) -> LoggerScenarioConfig {
    LoggerScenarioConfig {
        namespace: NS.to_string(),
        data_dir: data_dir(),
        ready: WaitConfig::new(Duration::from_millis(300), Duration::from_millis(20)),
        logs: WaitConfig::new(Duration::from_secs(2), Duration::from_millis(20)),
        expected_class: 0,
        predict: PredictConfig::default().with_ingress_host(cluster.address()),
    }
}

fn scenario(cluster: &FakeCluster, config: LoggerScenarioConfig) -> LoggerScenario {
    LoggerScenario::new(InferenceServiceClient::new(cluster.client()), config).expect("scenario")
}

#[test(tokio::test)]
async fn logger_events_reach_message_dumper() {
    let cluster = FakeCluster::start().await;

    let report = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect("scenario passes");

    assert_eq!(report.top_class, 0);
    assert!(report.classifier_ready);
    assert!(report.dumper_log.contains("org.kubeflow.serving.inference.request"));
    assert!(report.dumper_log.contains("org.kubeflow.serving.inference.response"));
    assert!(report.dumper_log.contains("Missing"));
    assert_eq!(cluster.predict_requests(), 2);
    assert!(cluster.isvc_names(NS).is_empty(), "services left behind");
}

#[test(tokio::test)]
async fn classifier_not_ready_is_diagnosed_and_run_continues() {
    let cluster = FakeCluster::builder()
        .never_ready(TENSORFLOW_SERVICE)
        .start()
        .await;

    let report = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect("scenario passes");

    assert!(!report.classifier_ready);
    assert!(report.dumper_log.contains("Missing"));
    assert!(cluster.isvc_names(NS).is_empty());
}

#[test(tokio::test)]
async fn dumper_not_ready_is_fatal_and_cleaned_up() {
    let cluster = FakeCluster::builder().never_ready(MESSAGE_DUMPER).start().await;

    let err = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect_err("dumper never ready");

    match err {
        E2eError::Cluster(report) => assert!(matches!(
            report.current_context(),
            KubernetesError::NotReady { name, .. } if name == MESSAGE_DUMPER
        )),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cluster.predict_requests(), 0);
    assert!(cluster.isvc_names(NS).is_empty());
}

#[test(tokio::test)]
async fn api_failure_while_waiting_for_classifier_is_fatal() {
    let cluster = FakeCluster::builder()
        .fail_gets(TENSORFLOW_SERVICE, 1)
        .start()
        .await;

    let err = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect_err("API failure must abort the run");

    match err {
        E2eError::Cluster(report) => assert!(matches!(
            report.current_context(),
            KubernetesError::RequestFailed { .. }
        )),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cluster.predict_requests(), 0);
    assert!(cluster.isvc_names(NS).is_empty());
}

#[test(tokio::test)]
async fn accepted_invalid_payload_still_requires_missing_marker() {
    let cluster = FakeCluster::builder().accept_invalid().start().await;
    let mut config = config(&cluster);
    config.logs = WaitConfig::new(Duration::from_millis(300), Duration::from_millis(20));

    let err = scenario(&cluster, config)
        .run()
        .await
        .expect_err("no Missing marker without a rejection");

    match err {
        E2eError::LogMarkers(report) => match report.current_context() {
            KubernetesError::LogMarkersMissing { missing } => assert_eq!(missing, "Missing"),
            other => panic!("unexpected context: {other}"),
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cluster.predict_requests(), 2);
    assert!(cluster.isvc_names(NS).is_empty());
}

#[test(tokio::test)]
async fn preexisting_service_is_not_deleted() {
    let cluster = FakeCluster::start().await;
    let client = InferenceServiceClient::new(cluster.client());
    client
        .create(&message_dumper_spec(NS))
        .await
        .expect("someone else's dumper");

    let err = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect_err("dumper already exists");

    match err {
        E2eError::Cluster(report) => assert!(matches!(
            report.current_context(),
            KubernetesError::RequestFailed { .. }
        )),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cluster.isvc_names(NS), vec![MESSAGE_DUMPER.to_string()]);
}

#[test(tokio::test)]
async fn wrong_top_class_fails_and_cleans_up() {
    let cluster = FakeCluster::builder()
        .scores(vec![0.05, 0.01, 0.9, 0.04])
        .start()
        .await;

    let err = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect_err("class mismatch");

    assert!(matches!(
        err,
        E2eError::UnexpectedClass {
            expected: 0,
            actual: 2
        }
    ));
    assert!(cluster.isvc_names(NS).is_empty());
}

#[test(tokio::test)]
async fn empty_scores_are_reported() {
    let cluster = FakeCluster::builder().scores(Vec::new()).start().await;

    let err = scenario(&cluster, config(&cluster))
        .run()
        .await
        .expect_err("no scores");

    assert!(matches!(err, E2eError::EmptyPrediction));
}

#[test(tokio::test)]
async fn missing_fixture_fails_before_creating_anything() {
    let cluster = FakeCluster::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::copy(data_dir().join(VALID_INPUT), dir.path().join(VALID_INPUT)).expect("copy");

    let mut config = config(&cluster);
    config.data_dir = dir.path().to_path_buf();
    let err = scenario(&cluster, config)
        .run()
        .await
        .expect_err("invalid fixture missing");

    assert!(matches!(err, E2eError::Fixture(_)));
    assert!(err.to_string().contains(INVALID_INPUT));
    assert_eq!(cluster.pod_count(NS), 0);
}

#[test(tokio::test)]
async fn teardown_is_idempotent() {
    let cluster = FakeCluster::start().await;
    let client = InferenceServiceClient::new(cluster.client());

    teardown(&client, NS).await.expect("nothing to delete");

    let cluster_config = config(&cluster);
    client
        .create(&message_dumper_spec(&cluster_config.namespace))
        .await
        .expect("create");
    teardown(&client, NS).await.expect("delete dumper");
    teardown(&client, NS).await.expect("delete again");
    assert!(cluster.isvc_names(NS).is_empty());
}
