//! End-to-end scenarios for inference services on a live cluster.
//!
//! [`scenario::LoggerScenario`] checks that a predictor's request/response
//! logger delivers cloud events to a message-dumper sink.

pub mod config;
pub mod error;
pub mod scenario;

pub use error::E2eError;
