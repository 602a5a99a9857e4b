//! Handler contract shared by the command and chat handlers.

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::query::Query;
use crate::stream::StageStream;

/// Turns a query into a lazy sequence of stage results.
///
/// `handle` only sets the work up; responses are produced as the returned
/// stream is pulled, each pull lending the query back to the producer.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Prepares the handler; called once when the processor is initialized.
    async fn initialize(&mut self, _config: &PipelineConfig) -> PipelineResult<()> {
        Ok(())
    }

    async fn handle(&self, query: &Query) -> PipelineResult<StageStream>;
}
