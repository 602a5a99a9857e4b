//! The content filter stage, serving both the pre and post stage names.

use async_trait::async_trait;
use tracing::debug;

use chatflow_message::{MessageChain, MessageComponent};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::query::{Query, Response};
use crate::stage::{
    POST_CONTENT_FILTER, PRE_CONTENT_FILTER, PipelineStage, StageOutput, StageProcessResult,
};

use super::registry::FilterRegistry;
use super::{ContentFilter, EnableStage, ResultLevel};

/// Runs the content filter chain over inbound messages and outbound replies.
///
/// # Pre-processing
///
/// Only chains made of `Plain`/`Source` components are inspected. Each
/// filter enabled for [`EnableStage::Pre`] sees the text left by the one
/// before it; the first `Block` or `Masked` verdict interrupts the query. If
/// every filter passes, the chain is replaced by a single `Plain` with the
/// final text.
///
/// # Post-processing
///
/// Only a last response that is a provider message with text content is
/// inspected. `Block` interrupts; `Pass` and `Masked` both hand their
/// replacement on, and the final text overwrites the response.
pub struct ContentFilterStage {
    registry: Option<FilterRegistry>,
    filters: Vec<Box<dyn ContentFilter>>,
}

impl ContentFilterStage {
    /// Creates a stage whose filters are built from `registry` at
    /// initialization.
    pub fn new(registry: FilterRegistry) -> Self {
        Self {
            registry: Some(registry),
            filters: Vec::new(),
        }
    }

    /// Creates a stage over an already assembled filter chain.
    pub fn with_filters(filters: Vec<Box<dyn ContentFilter>>) -> Self {
        Self {
            registry: None,
            filters,
        }
    }

    /// Names of the active filters, in chain order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    async fn pre_process(&self, query: &mut Query) -> PipelineResult<StageProcessResult> {
        if !query.message_chain().iter().all(MessageComponent::is_textual) {
            debug!(
                query_id = query.query_id(),
                "Message contains non-text components, skipping content filters"
            );
            return Ok(StageProcessResult::Continue);
        }

        if !query.pipeline_config().safety.content_filter.scope.filters_input() {
            return Ok(StageProcessResult::Continue);
        }

        let mut message = query.message_chain().to_string().trim().to_string();
        if message.is_empty() {
            return Ok(StageProcessResult::Continue);
        }

        for filter in self.enabled(EnableStage::Pre) {
            let result = filter
                .process(query, &message)
                .await
                .map_err(|e| PipelineError::filter_fault(filter.name(), e))?;

            match result.level {
                ResultLevel::Block | ResultLevel::Masked => {
                    debug!(filter = filter.name(), level = ?result.level, "Inbound message stopped");
                    return Ok(StageProcessResult::interrupt(
                        result.user_notice,
                        result.console_notice,
                    ));
                }
                ResultLevel::Pass => message = result.replacement,
            }
        }

        query.replace_message_chain(MessageChain::from(message));
        Ok(StageProcessResult::Continue)
    }

    async fn post_process(&self, query: &mut Query) -> PipelineResult<StageProcessResult> {
        let Some(text) = query.last_response().and_then(Response::text) else {
            debug!(
                query_id = query.query_id(),
                "Last response is not a text message, skipping content filters"
            );
            return Ok(StageProcessResult::Continue);
        };

        if !query.pipeline_config().safety.content_filter.scope.filters_output() {
            return Ok(StageProcessResult::Continue);
        }

        let mut message = text.trim().to_string();
        for filter in self.enabled(EnableStage::Post) {
            let result = filter
                .process(query, &message)
                .await
                .map_err(|e| PipelineError::filter_fault(filter.name(), e))?;

            match result.level {
                ResultLevel::Block => {
                    debug!(filter = filter.name(), "Outbound reply stopped");
                    return Ok(StageProcessResult::interrupt(
                        result.user_notice,
                        result.console_notice,
                    ));
                }
                ResultLevel::Pass | ResultLevel::Masked => message = result.replacement,
            }
        }

        query.set_last_response_text(message);
        Ok(StageProcessResult::Continue)
    }

    fn enabled(
        &self,
        stage: EnableStage,
    ) -> impl Iterator<Item = &(dyn ContentFilter + 'static)> {
        self.filters
            .iter()
            .map(|f| f.as_ref())
            .filter(move |f| f.enable_stages().contains(&stage))
    }
}

#[async_trait]
impl PipelineStage for ContentFilterStage {
    async fn initialize(&mut self, config: &PipelineConfig) -> PipelineResult<()> {
        if let Some(registry) = self.registry.take() {
            self.filters = registry.build(config)?;
        }

        for filter in &mut self.filters {
            let name = filter.name().to_string();
            filter
                .initialize(config)
                .await
                .map_err(|e| PipelineError::filter_init(name, e))?;
        }
        Ok(())
    }

    async fn process(&self, query: &mut Query, stage_name: &str) -> PipelineResult<StageOutput> {
        let result = match stage_name {
            PRE_CONTENT_FILTER => self.pre_process(query).await?,
            POST_CONTENT_FILTER => self.post_process(query).await?,
            other => return Err(PipelineError::UnknownStage(other.to_string())),
        };
        Ok(StageOutput::Single(result))
    }
}

impl std::fmt::Debug for ContentFilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFilterStage")
            .field("filters", &self.filter_names())
            .finish()
    }
}
