use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use e2e::config::Cli;
use e2e::config::Commands;
use e2e::config::LoggerArgs;
use e2e::config::TeardownArgs;
use e2e::scenario::logger;
use e2e::scenario::LoggerScenario;
use isvc_client::InferenceServiceClient;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init(std::env::var_os(logging::LOG_PATH_ENV_VAR));
    tracing::info!("Starting e2e {}", &**version::VERSION);

    match cli.command {
        Commands::Logger(args) => run_logger(*args).await,
        Commands::Teardown(args) => run_teardown(args).await,
    }
}

async fn connect(kubeconfig: Option<std::path::PathBuf>) -> Result<InferenceServiceClient> {
    InferenceServiceClient::connect(kubeconfig)
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("connect to Kubernetes API")
}

async fn run_logger(args: LoggerArgs) -> Result<()> {
    let client = connect(args.cluster.kubeconfig.clone()).await?;
    let scenario = LoggerScenario::new(client, args.scenario_config())?;
    let report = scenario.run().await?;

    tracing::info!(
        top_class = report.top_class,
        classifier_ready = report.classifier_ready,
        "logger scenario succeeded"
    );
    Ok(())
}

async fn run_teardown(args: TeardownArgs) -> Result<()> {
    let client = connect(args.cluster.kubeconfig).await?;
    logger::teardown(&client, &args.cluster.namespace).await?;
    Ok(())
}
