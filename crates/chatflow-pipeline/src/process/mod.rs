//! The message processor stage.
//!
//! Routes each query to the command handler or the chat handler and returns
//! the chosen handler's stream unchanged.

mod chat;
mod command;
mod handler;
mod preview;

pub use chat::{ChatMessageHandler, ChatRequest, ChatRunner};
pub use command::{CommandExecutor, CommandHandler, CommandInvocation, CommandReturn};
pub use handler::MessageHandler;
pub use preview::{preview, preview_query};

use async_trait::async_trait;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::query::Query;
use crate::stage::{PipelineStage, StageOutput};

/// Returns the first prefix in `prefixes` that `text` starts with.
///
/// Empty prefixes never match.
pub fn match_prefix<'a>(prefixes: &'a [String], text: &str) -> Option<&'a str> {
    prefixes
        .iter()
        .map(String::as_str)
        .find(|prefix| !prefix.is_empty() && text.starts_with(prefix))
}

/// Which handler a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command,
    Chat,
}

impl Route {
    /// Routes `text` by the command prefixes in `config`.
    pub fn of(config: &PipelineConfig, text: &str) -> Self {
        match match_prefix(&config.command.prefix, text.trim()) {
            Some(_) => Route::Command,
            None => Route::Chat,
        }
    }
}

/// The `MessageProcessor` stage.
pub struct Processor {
    command: Box<dyn MessageHandler>,
    chat: Box<dyn MessageHandler>,
}

impl Processor {
    pub fn new(command: impl MessageHandler + 'static, chat: impl MessageHandler + 'static) -> Self {
        Self {
            command: Box::new(command),
            chat: Box::new(chat),
        }
    }
}

#[async_trait]
impl PipelineStage for Processor {
    async fn initialize(&mut self, config: &PipelineConfig) -> PipelineResult<()> {
        self.command.initialize(config).await?;
        self.chat.initialize(config).await?;
        Ok(())
    }

    async fn process(&self, query: &mut Query, _stage_name: &str) -> PipelineResult<StageOutput> {
        info!(
            launcher = %format_args!("{}_{}", query.launcher_type(), query.launcher_id()),
            query_id = query.query_id(),
            preview = %preview_query(query),
            "Processing request"
        );

        let text = query.message_chain().to_string();
        let stream = match Route::of(query.pipeline_config(), &text) {
            Route::Command => self.command.handle(query).await?,
            Route::Chat => self.chat.handle(query).await?,
        };
        Ok(StageOutput::Stream(stream))
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor").finish_non_exhaustive()
    }
}
