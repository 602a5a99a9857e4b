//! Staged message processing pipeline.
//!
//! A [`Query`] flows through named stages:
//!
//! - [`ContentFilterStage`] under `PreContentFilterStage`: inspects the
//!   inbound chain and may rewrite or stop it
//! - [`Processor`] under `MessageProcessor`: routes to the command or chat
//!   handler and streams their replies
//! - [`ContentFilterStage`] under `PostContentFilterStage`: inspects each
//!   reply before it is delivered
//!
//! The [`Pipeline`] orchestrator drives the stages and hands replies to a
//! [`ReplySink`].

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod process;
pub mod query;
pub mod stage;
pub mod stream;

pub use config::{
    CommandConfig, ContentFilterConfig, FilterScope, IgnoreRules, PipelineConfig, SafetyConfig,
    TriggerConfig,
};
pub use error::{BoxError, PipelineError, PipelineResult};
pub use filter::{
    BAIDU_CLOUD_EXAMINE, BAN_WORD_FILTER, CONTENT_IGNORE, ContentFilter, ContentFilterStage,
    ContentIgnore, EnableStage, FilterFactory, FilterRegistry, FilterResult, ResultLevel,
};
pub use pipeline::{Pipeline, PipelineBuilder, ReplySink, RunReport};
pub use process::{
    ChatMessageHandler, ChatRequest, ChatRunner, CommandExecutor, CommandHandler,
    CommandInvocation, CommandReturn, MessageHandler, Processor, Route,
};
pub use query::{
    ChatMessage, Content, ContentPart, LauncherType, Query, Response, Role, SessionInfo,
};
pub use stage::{
    MESSAGE_PROCESSOR, POST_CONTENT_FILTER, PRE_CONTENT_FILTER, PipelineStage, StageOutput,
    StageProcessResult,
};
pub use stream::{Reply, ResultCursor, StageStream};
