use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::logger::LoggerArgs;
use crate::config::logger::TeardownArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the request/response logger scenario
    Logger(Box<LoggerArgs>),
    /// Delete the services created by the logger scenario
    Teardown(TeardownArgs),
}
