//! Surge Core - scenario orchestration and load generation
//!
//! This crate provides the building blocks of the Surge load tester: the
//! scenario suite and its handlers, configuration resolution, rate
//! parsing, ramp scheduling, the HTTP attack engine, result sinks, and
//! the orchestration runner that ties them together.

pub mod attack;
pub mod cleanup;
pub mod config;
pub mod connection;
pub mod handlers;
pub mod ramp;
pub mod rate;
pub mod runner;
pub mod scenario;
pub mod sink;

// Re-export main types for convenient access
pub use attack::{AttackEngine, HttpAttackEngine, Outcome};
pub use config::{ConfigResolver, ConfigStore, RunDefaults};
pub use connection::{ApiConnection, ConnectionConfig};
pub use ramp::{RampKind, RampSchedule};
pub use rate::{Rate, parse_rate};
pub use runner::Runner;
pub use scenario::{ExecutionContext, Scenario, scenario_table};

/// Core errors that can bubble up from any Surge subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SurgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Rate error: {0}")]
    Rate(#[from] rate::RateError),

    #[error("Connection error: {0}")]
    Connection(#[from] connection::ConnectionError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] handlers::ScenarioError),

    #[error("Result sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker failure: {reason}")]
    Worker { reason: String },
}

pub type Result<T> = std::result::Result<T, SurgeError>;
