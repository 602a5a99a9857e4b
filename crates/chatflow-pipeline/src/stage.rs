//! Stage contract.
//!
//! A stage is invoked under a stage name and returns either a single
//! [`StageProcessResult`] or a [`StageStream`] of them.

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::query::Query;
use crate::stream::StageStream;

/// Stage name of the inbound content filter.
pub const PRE_CONTENT_FILTER: &str = "PreContentFilterStage";
/// Stage name of the outbound content filter.
pub const POST_CONTENT_FILTER: &str = "PostContentFilterStage";
/// Stage name of the command/chat processor.
pub const MESSAGE_PROCESSOR: &str = "MessageProcessor";

/// Outcome of one stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageProcessResult {
    /// Keep going with the (possibly mutated) query.
    Continue,
    /// Stop processing this query.
    Interrupt {
        /// Shown to the user; nothing is sent when `None` or empty.
        user_notice: Option<String>,
        /// Written to the log.
        console_notice: Option<String>,
    },
}

impl StageProcessResult {
    /// Creates an interrupt with the given notices.
    pub fn interrupt(user_notice: Option<String>, console_notice: Option<String>) -> Self {
        Self::Interrupt {
            user_notice,
            console_notice,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt { .. })
    }
}

/// What a stage returns: one result or a lazy sequence.
pub enum StageOutput {
    Single(StageProcessResult),
    Stream(StageStream),
}

impl From<StageProcessResult> for StageOutput {
    fn from(result: StageProcessResult) -> Self {
        StageOutput::Single(result)
    }
}

impl From<StageStream> for StageOutput {
    fn from(stream: StageStream) -> Self {
        StageOutput::Stream(stream)
    }
}

impl std::fmt::Debug for StageOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutput::Single(result) => f.debug_tuple("Single").field(result).finish(),
            StageOutput::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

/// A pipeline stage.
///
/// Stages are initialized once, then shared read-only across queries.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Prepares the stage; called once before any query.
    async fn initialize(&mut self, _config: &PipelineConfig) -> PipelineResult<()> {
        Ok(())
    }

    /// Processes a query under `stage_name`.
    async fn process(&self, query: &mut Query, stage_name: &str) -> PipelineResult<StageOutput>;
}
