//! # Chatflow
//!
//! A staged, streaming message pipeline for conversational bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────┐   ┌──────────────────┐   ┌─────────────────────┐   ┌──────┐
//! │ Adapter  │──▶│ PreContentFilter   │──▶│ MessageProcessor │══▶│ PostContentFilter   │──▶│ Sink │
//! │ (chain)  │   │ ignore, ban words  │   │ command | chat   │   │ per streamed reply  │   │      │
//! └──────────┘   └────────────────────┘   └──────────────────┘   └─────────────────────┘   └──────┘
//! ```
//!
//! - **Message**: [`MessageChain`](message::MessageChain) of typed components
//! - **Filters**: pluggable [`ContentFilter`](pipeline::ContentFilter)s that pass,
//!   mask or block text
//! - **Handlers**: a command executor and a chat runner, both streaming
//! - **Runtime**: configuration, logging and the shared pipeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChatflowRuntime::builder()
//!         .build(
//!             CommandHandler::new(MyCommands),
//!             ChatMessageHandler::new(MyModel),
//!             Arc::new(MyPlatform),
//!         )
//!         .await?;
//!
//!     runtime.submit(runtime.query(SessionInfo::person("10001"), "hello".into()));
//!     runtime.run_until(ChatflowRuntime::shutdown_signal()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use chatflow_message as message;
pub use chatflow_pipeline as pipeline;
pub use chatflow_runtime as runtime;

/// Commonly used types for wiring a pipeline.
///
/// ```rust,ignore
/// use chatflow::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use chatflow_runtime::{ChatflowConfig, ChatflowRuntime, RuntimeError};

    // Messages
    pub use chatflow_message::{ComponentKind, Id, MessageChain, MessageComponent};

    // Query and replies
    pub use chatflow_pipeline::{
        ChatMessage, LauncherType, PipelineConfig, Query, ReplySink, Response, Role, SessionInfo,
    };

    // Handlers
    pub use chatflow_pipeline::{
        ChatMessageHandler, ChatRequest, ChatRunner, CommandExecutor, CommandHandler,
        CommandInvocation, CommandReturn,
    };

    // Filters
    pub use chatflow_pipeline::{ContentFilter, EnableStage, FilterResult, ResultLevel};

    pub use chatflow_pipeline::BoxError;
    pub use std::sync::Arc;
}
