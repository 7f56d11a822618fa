//! Kubernetes client bootstrap.

use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::info;

use crate::error::KubernetesError;

/// Where the client configuration is read from.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum KubeconfigSource {
    #[display("kubeconfig file {}", _0.display())]
    File(PathBuf),
    #[display("inferred config (in-cluster or ~/.kube/config)")]
    Inferred,
}

impl KubeconfigSource {
    /// An explicit path wins; an empty one falls back to inference. A leading
    /// `~` is expanded, since `KUBECONFIG=~/.kube/config` reaches us verbatim
    /// when set outside a shell.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Self::File(expand_home(&path, dirs::home_dir().as_deref())),
            None => Self::Inferred,
        }
    }
}

fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

async fn load_config(source: &KubeconfigSource) -> Result<Config, Report<KubernetesError>> {
    match source {
        KubeconfigSource::File(path) => {
            let kubeconfig =
                Kubeconfig::read_from(path).change_context(KubernetesError::ConnectionFailed {
                    message: format!("cannot read {source}"),
                })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!("invalid {source}"),
                })
        }
        KubeconfigSource::Inferred => {
            Config::infer()
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!("no usable {source}"),
                })
        }
    }
}

/// Builds a client from `kubeconfig`, or from the inferred configuration when
/// `None`.
pub async fn init_kube_client(
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<KubernetesError>> {
    let source = KubeconfigSource::from_path(kubeconfig);
    let config = load_config(&source).await?;
    info!(
        %source,
        cluster = %config.cluster_url,
        namespace = %config.default_namespace,
        "Kubernetes client configured"
    );

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: format!("cannot build client from {source}"),
    })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn empty_path_means_inferred() {
        assert_eq!(KubeconfigSource::from_path(None), KubeconfigSource::Inferred);
        assert_eq!(
            KubeconfigSource::from_path(Some(PathBuf::new())),
            KubeconfigSource::Inferred
        );
        assert_eq!(
            KubeconfigSource::from_path(Some(PathBuf::from("/etc/kube/ci.yaml"))),
            KubeconfigSource::File(PathBuf::from("/etc/kube/ci.yaml"))
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = Path::new("/home/ci");
        assert_eq!(
            expand_home(Path::new("~/.kube/config"), Some(home)),
            PathBuf::from("/home/ci/.kube/config")
        );
        assert_eq!(
            expand_home(Path::new("~/.kube/config"), None),
            PathBuf::from("~/.kube/config")
        );
        assert_eq!(
            expand_home(Path::new("relative/config"), Some(home)),
            PathBuf::from("relative/config")
        );
    }

    #[test(tokio::test)]
    async fn missing_kubeconfig_file_is_connection_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent");
        let Err(report) = init_kube_client(Some(path.clone())).await else {
            panic!("kubeconfig does not exist");
        };

        match report.current_context() {
            KubernetesError::ConnectionFailed { message } => {
                assert!(message.contains(&path.display().to_string()), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test(tokio::test)]
    async fn malformed_kubeconfig_is_connection_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config");
        std::fs::write(&path, "clusters: [not, a, map").expect("write");

        let Err(report) = init_kube_client(Some(path)).await else {
            panic!("kubeconfig is malformed");
        };
        assert!(matches!(
            report.current_context(),
            KubernetesError::ConnectionFailed { .. }
        ));
    }
}
