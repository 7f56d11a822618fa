//! client config

use std::time::Duration;

/// Environment variable overriding the ingress gateway address (`host[:port]`).
pub const INGRESS_HOST_ENV_VAR: &str = "KFSERVING_INGRESS_HOST_PORT";

/// Bounded poll-until-condition parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// give up after this long
    pub timeout: Duration,
    /// delay between two checks
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    /// 600s / 10s, the readiness budget of the serving control plane.
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// set poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Where and how prediction requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictConfig {
    /// explicit ingress address, skips gateway service lookup
    pub ingress_host: Option<String>,
    /// gateway service fronting every inference service
    pub ingress_service: String,
    /// namespace of the gateway service
    pub ingress_namespace: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            ingress_host: None,
            ingress_service: "istio-ingressgateway".to_string(),
            ingress_namespace: "istio-system".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl PredictConfig {
    /// Defaults, with the ingress address taken from
    /// [`INGRESS_HOST_ENV_VAR`] when set and non-empty.
    pub fn from_env() -> Self {
        let ingress_host = std::env::var(INGRESS_HOST_ENV_VAR)
            .ok()
            .filter(|host| !host.is_empty());
        Self {
            ingress_host,
            ..Default::default()
        }
    }

    /// set ingress address.
    pub fn with_ingress_host(mut self, host: impl Into<String>) -> Self {
        self.ingress_host = Some(host.into());
        self
    }

    /// set gateway service.
    pub fn with_ingress_service(
        mut self,
        namespace: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        self.ingress_namespace = namespace.into();
        self.ingress_service = service.into();
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
