//! In-process stand-in for the cluster an e2e run talks to.
//!
//! A single HTTP server plays four roles:
//!
//! - the slice of the Kubernetes API used by the client (inference services,
//!   pod listing by label, pod logs, the ingress gateway service)
//! - the control plane, which marks submitted services ready (unless told not
//!   to) and schedules one pod per service
//! - the ingress gateway and a classifier predictor behind it
//! - the logger sidecar and message dumper, appending request/response cloud
//!   events to the logs of the service named by the logger URL

mod handlers;
mod state;

use std::collections::HashMap;
use std::collections::HashSet;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use poem::get;
use poem::listener::TcpListener;
use poem::post;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::error;

use crate::handlers::SharedState;
use crate::state::ClusterState;
use crate::state::DEFAULT_SCORES;

const ISVC_PATH: &str = "/apis/serving.kubeflow.org/v1alpha2/namespaces/:namespace/inferenceservices";

fn routes(state: SharedState) -> impl Endpoint {
    Route::new()
        .at(ISVC_PATH, post(handlers::create_isvc))
        .at(
            format!("{ISVC_PATH}/:name"),
            get(handlers::get_isvc).delete(handlers::delete_isvc),
        )
        .at("/api/v1/namespaces/:namespace/pods", get(handlers::list_pods))
        .at(
            "/api/v1/namespaces/:namespace/pods/:name/log",
            get(handlers::pod_log),
        )
        .at(
            "/api/v1/namespaces/:namespace/services/:name",
            get(handlers::get_service),
        )
        .at("/v1/models/:model", post(handlers::predict))
        .data(state)
}

#[derive(Debug, Clone, Default)]
pub struct FakeClusterBuilder {
    never_ready: HashSet<String>,
    failing_gets: HashMap<String, usize>,
    accept_invalid: bool,
    scores: Option<Vec<f64>>,
}

impl FakeClusterBuilder {
    /// Services named `name` are admitted but never report ready.
    pub fn never_ready(mut self, name: &str) -> Self {
        self.never_ready.insert(name.to_string());
        self
    }

    /// The next `count` GETs of service `name` fail with 500.
    pub fn fail_gets(mut self, name: &str, count: usize) -> Self {
        self.failing_gets.insert(name.to_string(), count);
        self
    }

    /// Predict payloads lacking `instances`/`inputs` are answered 200.
    pub fn accept_invalid(mut self) -> Self {
        self.accept_invalid = true;
        self
    }

    /// Scores returned for every valid prediction request.
    pub fn scores(mut self, scores: Vec<f64>) -> Self {
        self.scores = Some(scores);
        self
    }

    /// Bind a random local port and serve until the cluster is dropped.
    pub async fn start(self) -> FakeCluster {
        // bind a random port, release it, then let poem bind the same port
        let std_listener = StdTcpListener::bind("127.0.0.1:0").expect("bind std listener");
        let port = std_listener.local_addr().expect("local addr").port();
        drop(std_listener);

        let address = format!("127.0.0.1:{port}");
        let state: SharedState = Arc::new(Mutex::new(ClusterState {
            never_ready: self.never_ready,
            failing_gets: self.failing_gets,
            accept_invalid: self.accept_invalid,
            scores: self.scores.unwrap_or_else(|| DEFAULT_SCORES.to_vec()),
            ingress_address: address.clone(),
            ..Default::default()
        }));

        let app = routes(state.clone());

        let listener = TcpListener::bind(address.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = Server::new(listener).run(app).await {
                error!("fake cluster stopped: {e}");
            }
        });

        for _ in 0..100 {
            if tokio::net::TcpStream::connect(&address).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        FakeCluster {
            state,
            address,
            server,
        }
    }
}

/// Handle to a running fake cluster. The server stops on drop.
pub struct FakeCluster {
    state: SharedState,
    address: String,
    server: JoinHandle<()>,
}

impl FakeCluster {
    pub fn builder() -> FakeClusterBuilder {
        FakeClusterBuilder::default()
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// `host:port` the server listens on; also the ingress gateway address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Kubernetes client pointed at this cluster.
    pub fn client(&self) -> kube::Client {
        let config = kube::Config::new(self.url().parse().expect("fake cluster url"));
        kube::Client::try_from(config).expect("client for fake cluster")
    }

    /// Stored inference service, as the API server would return it.
    pub fn isvc(&self, namespace: &str, name: &str) -> Option<Value> {
        self.lock()
            .isvcs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn isvc_names(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .isvcs
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Flip the `Ready` condition of an admitted service.
    pub fn set_ready(&self, namespace: &str, name: &str, ready: bool) {
        self.lock().set_ready(namespace, name, ready);
    }

    /// Concatenated logs of the pods backing service `name`.
    pub fn logs_of(&self, namespace: &str, name: &str) -> String {
        self.lock()
            .pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && pod.isvc == name)
            .map(|(_, pod)| pod.log.as_str())
            .collect()
    }

    pub fn pod_count(&self, namespace: &str) -> usize {
        self.lock()
            .pods
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .count()
    }

    /// Number of requests that reached a predictor.
    pub fn predict_requests(&self) -> usize {
        self.lock().predict_requests
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClusterState> {
        self.state.lock().expect("cluster state poisoned")
    }
}

impl Drop for FakeCluster {
    fn drop(&mut self) {
        self.server.abort();
    }
}
