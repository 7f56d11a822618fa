mod cli;
mod logger;

pub use cli::Cli;
pub use cli::Commands;
pub use logger::ClusterArgs;
pub use logger::LoggerArgs;
pub use logger::TeardownArgs;
pub use logger::DEFAULT_NAMESPACE;
