use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use isvc_client::config::INGRESS_HOST_ENV_VAR;
use isvc_client::PredictConfig;
use isvc_client::WaitConfig;

use crate::scenario::LoggerScenarioConfig;

pub const DEFAULT_NAMESPACE: &str = "kfserving-ci-e2e-test";

/// Where the services live and how to reach the API server.
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    #[arg(
        long,
        env = "KFSERVING_TEST_NAMESPACE",
        default_value = DEFAULT_NAMESPACE,
        help = "Namespace the test services are created in"
    )]
    pub namespace: String,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (optional, defaults to in-cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct LoggerArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[arg(
        long,
        value_hint = clap::ValueHint::DirPath,
        default_value = "data",
        help = "Directory containing flower_input.json and flower_input_invalid.json"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long,
        env = INGRESS_HOST_ENV_VAR,
        help = "Ingress gateway address (host[:port]); looked up from istio-system/istio-ingressgateway when unset"
    )]
    pub ingress_host: Option<String>,

    #[arg(
        long,
        default_value = "600",
        help = "Seconds to wait for each service to become ready"
    )]
    pub ready_timeout_secs: u64,

    #[arg(long, default_value = "10", help = "Seconds between readiness checks")]
    pub ready_poll_secs: u64,

    #[arg(
        long,
        default_value = "60",
        help = "Seconds to wait for logger events to reach the message dumper"
    )]
    pub log_timeout_secs: u64,

    #[arg(long, default_value = "500", help = "Milliseconds between log reads")]
    pub log_poll_millis: u64,

    #[arg(
        long,
        default_value = "0",
        help = "Class index the valid payload must be classified as"
    )]
    pub expected_class: usize,
}

impl LoggerArgs {
    pub fn scenario_config(&self) -> LoggerScenarioConfig {
        let mut predict = PredictConfig::default();
        if let Some(host) = self.ingress_host.as_ref().filter(|h| !h.is_empty()) {
            predict = predict.with_ingress_host(host.clone());
        }
        LoggerScenarioConfig {
            namespace: self.cluster.namespace.clone(),
            data_dir: self.data_dir.clone(),
            ready: WaitConfig::new(
                Duration::from_secs(self.ready_timeout_secs),
                Duration::from_secs(self.ready_poll_secs),
            ),
            logs: WaitConfig::new(
                Duration::from_secs(self.log_timeout_secs),
                Duration::from_millis(self.log_poll_millis),
            ),
            expected_class: self.expected_class,
            predict,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct TeardownArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}
