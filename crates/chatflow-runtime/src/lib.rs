//! Chatflow runtime: configuration loading, logging setup and the wiring
//! that turns a configuration plus handlers into a running pipeline.
//!
//! ```rust,ignore
//! use chatflow_runtime::ChatflowRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChatflowRuntime::builder()
//!         .build(CommandHandler::new(commands), ChatMessageHandler::new(runner), sink)
//!         .await?;
//!
//!     // feed queries from a platform adapter
//!     runtime.submit(runtime.query(session, chain));
//!
//!     runtime.run_until(ChatflowRuntime::shutdown_signal()).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ChatflowConfig, ConfigError, ConfigLoader, ConfigResult, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, load_config, load_config_from_file, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ChatflowRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler and filter implementations.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
