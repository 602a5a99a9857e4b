//! Runtime wiring: configuration, logging and one shared pipeline.
//!
//! ```rust,ignore
//! let runtime = ChatflowRuntime::builder()
//!     .config_file("chatflow.toml")
//!     .filter(BAN_WORD_FILTER, |_| Box::new(MyBanWords::default()))
//!     .build(commands, chat, sink)
//!     .await?;
//!
//! let query = runtime.query(SessionInfo::group("42", "7"), chain);
//! runtime.submit(query);
//!
//! runtime.run_until(ChatflowRuntime::shutdown_signal()).await;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chatflow_message::MessageChain;
use chatflow_pipeline::{
    ContentFilter, ContentFilterStage, FilterRegistry, MESSAGE_PROCESSOR, MessageHandler,
    POST_CONTENT_FILTER, PRE_CONTENT_FILTER, Pipeline, PipelineConfig, PipelineResult, Processor,
    Query, ReplySink, RunReport, SessionInfo,
};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ChatflowConfig, ConfigLoader, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured pipeline plus the tasks running queries through it.
pub struct ChatflowRuntime {
    config: ChatflowConfig,
    pipeline_config: Arc<PipelineConfig>,
    pipeline: Arc<Pipeline>,
    next_query_id: AtomicU64,
    tasks: Mutex<JoinSet<()>>,
}

impl ChatflowRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &ChatflowConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Creates a query with the next id, bound to the loaded pipeline config.
    pub fn query(&self, session: SessionInfo, message_chain: MessageChain) -> Query {
        let query_id = self.next_query_id.fetch_add(1, Ordering::Relaxed);
        Query::new(
            query_id,
            session,
            message_chain,
            Arc::clone(&self.pipeline_config),
        )
    }

    /// Runs `query` to completion on the current task.
    pub async fn handle(&self, query: Query) -> PipelineResult<RunReport> {
        self.pipeline.run(query).await
    }

    /// Runs `query` on its own task and returns its id.
    ///
    /// Failures are logged (and the user notified) by the pipeline itself.
    pub fn submit(&self, query: Query) -> u64 {
        let query_id = query.query_id();
        let pipeline = Arc::clone(&self.pipeline);
        let mut tasks = self.lock_tasks();
        reap_finished(&mut tasks);
        tasks.spawn(async move {
            if let Ok(report) = pipeline.run(query).await {
                debug!(query_id, delivered = report.delivered, "Submitted query done");
            }
        });
        query_id
    }

    /// Number of submitted queries still running.
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.lock_tasks();
        reap_finished(&mut tasks);
        tasks.len()
    }

    /// Waits for every submitted query to finish.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.lock_tasks());
        if tasks.is_empty() {
            return;
        }

        info!(pending = tasks.len(), "Waiting for in-flight queries");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Query task panicked");
            }
        }
    }

    /// Waits for `shutdown`, then drains in-flight queries.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Chatflow runtime is running");
        shutdown.await;
        self.drain().await;
        info!("Chatflow runtime stopped");
    }

    /// Resolves on Ctrl+C or SIGTERM.
    pub async fn shutdown_signal() {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    }
                    return;
                }
                Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
            }
        }

        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes completed tasks without waiting on running ones.
fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "Query task panicked");
        }
    }
}

impl std::fmt::Debug for ChatflowRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatflowRuntime")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`ChatflowRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<ChatflowConfig>,
    filters: FilterRegistry,
    failure_notice: Option<String>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Searches the current directory for config and registers the
    /// built-in filters.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            filters: FilterRegistry::with_builtin(),
            failure_notice: None,
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: ChatflowConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is; no files or environment are read.
    pub fn config(mut self, config: ChatflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers a content filter constructor.
    pub fn filter<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PipelineConfig) -> Box<dyn ContentFilter> + Send + Sync + 'static,
    {
        self.filters.register(name, factory);
        self
    }

    /// Replaces the notice users get when their query fails.
    pub fn failure_notice(mut self, notice: impl Into<String>) -> Self {
        self.failure_notice = Some(notice.into());
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads and validates configuration, sets up logging and initializes
    /// the pipeline stages.
    pub async fn build(
        self,
        command: impl MessageHandler + 'static,
        chat: impl MessageHandler + 'static,
        sink: Arc<dyn ReplySink>,
    ) -> RuntimeResult<ChatflowRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        validate_config(&config)?;

        let mut builder = Pipeline::builder(sink)
            .stage(PRE_CONTENT_FILTER, ContentFilterStage::new(self.filters))
            .stage(MESSAGE_PROCESSOR, Processor::new(command, chat))
            .alias(POST_CONTENT_FILTER, PRE_CONTENT_FILTER);
        if let Some(notice) = self.failure_notice {
            builder = builder.failure_notice(notice);
        }
        let pipeline = builder.build(&config.pipeline).await?;

        info!(
            log_level = %config.logging.level,
            command_prefixes = ?config.pipeline.command.prefix,
            filter_scope = ?config.pipeline.safety.content_filter.scope,
            "Chatflow runtime ready"
        );

        Ok(ChatflowRuntime {
            pipeline_config: Arc::new(config.pipeline.clone()),
            config,
            pipeline: Arc::new(pipeline),
            next_query_id: AtomicU64::new(0),
            tasks: Mutex::new(JoinSet::new()),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
