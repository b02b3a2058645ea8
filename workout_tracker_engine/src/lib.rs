pub mod config;
pub mod coordinator;
pub mod engine;
pub mod filter;
pub mod platform;
pub mod session;

pub use engine::{EngineHandle, MetricsSnapshot, WorkoutEngine};

/// Failures of the engine command surface. Everything the platform
/// collaborators can fail at is reported through `anyhow` at the call
/// site and logged; this enum only covers the engine task itself.
#[derive(Debug)]
pub enum EngineError {
    /// The engine task is gone, commands can no longer be delivered.
    Stopped,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Stopped => write!(f, "the engine task has stopped"),
        }
    }
}

impl std::error::Error for EngineError {}
