pub mod bootstrap;
pub mod config;
pub mod consumer;
pub mod error;
pub mod telemetry;

pub use consumer::{Consumer, PollOutcome};
pub use error::WorkerError;
