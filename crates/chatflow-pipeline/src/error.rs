//! Error types for pipeline execution.
//!
//! Stage-local conditions the user should hear about are expressed as
//! [`StageProcessResult::Interrupt`](crate::stage::StageProcessResult), not as
//! errors. Everything here escalates to the orchestrator.

use thiserror::Error;

use chatflow_message::MessageError;

/// Boxed error produced by external collaborators (runners, executors, sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort the processing of a query.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A content filter failed while processing.
    #[error("content filter '{filter}' failed: {reason}")]
    FilterFault {
        /// Name of the failing filter.
        filter: String,
        /// Reason for failure.
        reason: String,
    },

    /// A command or chat handler failed.
    #[error("{handler} handler failed: {reason}")]
    Handler {
        /// Which handler failed.
        handler: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// A stage was invoked under a name it does not serve.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Configuration requires a filter that nobody registered.
    #[error("content filter '{0}' is required by configuration but not registered")]
    FilterNotRegistered(String),

    /// A filter could not be initialized.
    #[error("failed to initialize content filter '{filter}': {reason}")]
    FilterInit {
        /// Name of the filter.
        filter: String,
        /// Reason for failure.
        reason: String,
    },

    /// A reply or notice could not be delivered.
    #[error("failed to deliver reply: {0}")]
    Delivery(String),

    /// Message model error.
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl PipelineError {
    /// Creates a filter fault.
    pub fn filter_fault(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::FilterFault {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a handler error.
    pub fn handler(handler: &'static str, reason: impl ToString) -> Self {
        Self::Handler {
            handler,
            reason: reason.to_string(),
        }
    }

    /// Creates a filter initialization error.
    pub fn filter_init(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::FilterInit {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
