pub mod logger;
pub mod specs;

pub use logger::LoggerReport;
pub use logger::LoggerScenario;
pub use logger::LoggerScenarioConfig;
