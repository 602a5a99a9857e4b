//! Runtime error types.

use chatflow_pipeline::PipelineError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage failed to initialize.
    #[error("Pipeline setup failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
