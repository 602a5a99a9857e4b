//! Content filtering.
//!
//! A [`ContentFilter`] inspects message text and answers with a
//! [`FilterResult`]. Filters are assembled into a chain by the
//! [`FilterRegistry`] and run by the [`ContentFilterStage`] before the
//! message is processed and again on the outgoing reply.

mod ignore;
mod registry;
mod stage;

pub use ignore::ContentIgnore;
pub use registry::{
    BAIDU_CLOUD_EXAMINE, BAN_WORD_FILTER, CONTENT_IGNORE, FilterFactory, FilterRegistry,
};
pub use stage::ContentFilterStage;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::error::BoxError;
use crate::query::Query;

/// Where a filter takes part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnableStage {
    /// Inbound message, before processing.
    Pre,
    /// Outbound reply, after processing.
    Post,
}

/// Verdict of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultLevel {
    /// Acceptable; the replacement text carries on down the chain.
    Pass,
    /// Acceptable after masking.
    Masked,
    /// Not acceptable.
    Block,
}

/// The outcome of one filter over one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub level: ResultLevel,
    /// Text to continue with.
    pub replacement: String,
    /// Shown to the user when the message is stopped.
    pub user_notice: Option<String>,
    /// Written to the log when the message is stopped.
    pub console_notice: Option<String>,
}

impl FilterResult {
    pub fn pass(replacement: impl Into<String>) -> Self {
        Self {
            level: ResultLevel::Pass,
            replacement: replacement.into(),
            user_notice: None,
            console_notice: None,
        }
    }

    pub fn masked(replacement: impl Into<String>) -> Self {
        Self {
            level: ResultLevel::Masked,
            ..Self::pass(replacement)
        }
    }

    pub fn block(user_notice: impl Into<String>, console_notice: impl Into<String>) -> Self {
        Self {
            level: ResultLevel::Block,
            replacement: String::new(),
            user_notice: Some(user_notice.into()),
            console_notice: Some(console_notice.into()),
        }
    }

    /// Sets the notices (builder pattern).
    pub fn with_notices(
        mut self,
        user_notice: impl Into<String>,
        console_notice: impl Into<String>,
    ) -> Self {
        self.user_notice = Some(user_notice.into());
        self.console_notice = Some(console_notice.into());
        self
    }
}

/// A pluggable content filter.
///
/// Concrete sensitive-word and moderation filters live outside this crate and
/// are registered under [`BAN_WORD_FILTER`] and [`BAIDU_CLOUD_EXAMINE`].
#[async_trait]
pub trait ContentFilter: Send + Sync {
    /// Registry name of this filter.
    fn name(&self) -> &str;

    /// Stages this filter takes part in.
    fn enable_stages(&self) -> &[EnableStage] {
        &[EnableStage::Pre, EnableStage::Post]
    }

    /// Prepares the filter; called once when the stage is initialized.
    async fn initialize(&mut self, _config: &PipelineConfig) -> Result<(), BoxError> {
        Ok(())
    }

    /// Checks `message` on behalf of `query`.
    async fn process(&self, query: &Query, message: &str) -> Result<FilterResult, BoxError>;
}
