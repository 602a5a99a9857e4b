//! The pipeline orchestrator.
//!
//! A [`Pipeline`] runs named stages over one query in order:
//!
//! 1. A single `Continue` moves on to the next stage
//! 2. An `Interrupt` logs its console notice, tells the user its user notice
//!    (when non-empty) and ends the run
//! 3. A stream is pulled item by item; every `Continue` item runs all
//!    remaining stages before the next item is pulled, and an `Interrupt`
//!    item ends the run and closes the stream
//!
//! Whenever execution passes the last stage, the query's last response is
//! delivered through the [`ReplySink`].
//!
//! ```rust,ignore
//! let pipeline = Pipeline::builder(sink)
//!     .stage(PRE_CONTENT_FILTER, ContentFilterStage::new(FilterRegistry::with_builtin()))
//!     .stage(MESSAGE_PROCESSOR, processor)
//!     .alias(POST_CONTENT_FILTER, PRE_CONTENT_FILTER)
//!     .build(&config)
//!     .await?;
//!
//! let report = pipeline.run(query).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::error::{BoxError, PipelineError, PipelineResult};
use crate::filter::ContentFilterStage;
use crate::process::Processor;
use crate::query::{Query, Response};
use crate::stage::{
    MESSAGE_PROCESSOR, POST_CONTENT_FILTER, PRE_CONTENT_FILTER, PipelineStage, StageOutput,
    StageProcessResult,
};

const DEFAULT_FAILURE_NOTICE: &str = "Something went wrong while handling your message.";

/// Delivers replies and notices back to the platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Sends a reply produced for `query`.
    async fn deliver(&self, query: &Query, response: &Response) -> Result<(), BoxError>;

    /// Sends a plain notice to the user behind `query`.
    async fn notify(&self, query: &Query, notice: &str) -> Result<(), BoxError>;
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Replies handed to the sink.
    pub delivered: usize,
    /// Whether any stage interrupted.
    pub interrupted: bool,
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles and initializes a [`Pipeline`].
pub struct PipelineBuilder {
    instances: Vec<Box<dyn PipelineStage>>,
    order: Vec<(String, usize)>,
    unresolved: Vec<String>,
    sink: Arc<dyn ReplySink>,
    failure_notice: String,
}

impl PipelineBuilder {
    /// Appends `stage` under `name`.
    pub fn stage(mut self, name: impl Into<String>, stage: impl PipelineStage + 'static) -> Self {
        self.instances.push(Box::new(stage));
        self.order.push((name.into(), self.instances.len() - 1));
        self
    }

    /// Appends the stage registered earlier as `existing`, invoked as `name`.
    pub fn alias(mut self, name: impl Into<String>, existing: &str) -> Self {
        let found = self
            .order
            .iter()
            .find(|(n, _)| n == existing)
            .map(|(_, index)| *index);
        match found {
            Some(index) => self.order.push((name.into(), index)),
            None => self.unresolved.push(existing.to_string()),
        }
        self
    }

    /// Sets the notice sent to the user when a run fails.
    pub fn failure_notice(mut self, notice: impl Into<String>) -> Self {
        self.failure_notice = notice.into();
        self
    }

    /// Initializes every stage once and freezes the pipeline.
    pub async fn build(self, config: &PipelineConfig) -> PipelineResult<Pipeline> {
        if let Some(missing) = self.unresolved.into_iter().next() {
            return Err(PipelineError::UnknownStage(missing));
        }

        let mut shared: Vec<Arc<dyn PipelineStage>> = Vec::with_capacity(self.instances.len());
        for mut stage in self.instances {
            stage.initialize(config).await?;
            shared.push(Arc::from(stage));
        }

        let stages = self
            .order
            .into_iter()
            .map(|(name, index)| (name, Arc::clone(&shared[index])))
            .collect::<Vec<_>>();

        info!(
            stages = ?stages.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            "Pipeline initialized"
        );

        Ok(Pipeline {
            stages,
            sink: self.sink,
            failure_notice: self.failure_notice,
        })
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An initialized, shareable sequence of stages.
pub struct Pipeline {
    stages: Vec<(String, Arc<dyn PipelineStage>)>,
    sink: Arc<dyn ReplySink>,
    failure_notice: String,
}

impl Pipeline {
    /// Starts building a pipeline that delivers through `sink`.
    pub fn builder(sink: Arc<dyn ReplySink>) -> PipelineBuilder {
        PipelineBuilder {
            instances: Vec::new(),
            order: Vec::new(),
            unresolved: Vec::new(),
            sink,
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
        }
    }

    /// Builds the standard pre-filter, processor, post-filter pipeline.
    pub async fn standard(
        filter_stage: ContentFilterStage,
        processor: Processor,
        sink: Arc<dyn ReplySink>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        Self::builder(sink)
            .stage(PRE_CONTENT_FILTER, filter_stage)
            .stage(MESSAGE_PROCESSOR, processor)
            .alias(POST_CONTENT_FILTER, PRE_CONTENT_FILTER)
            .build(config)
            .await
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|(name, _)| name.as_str())
    }

    /// Runs `query` through every stage.
    ///
    /// On failure the error is logged, the user receives the generic failure
    /// notice, and the error is returned.
    pub async fn run(&self, mut query: Query) -> PipelineResult<RunReport> {
        let span = info_span!(
            "pipeline",
            query_id = query.query_id(),
            launcher = %format_args!("{}_{}", query.launcher_type(), query.launcher_id()),
        );

        async move {
            let mut report = RunReport::default();
            match self.execute_from(0, &mut query, &mut report).await {
                Ok(()) => {
                    debug!(
                        delivered = report.delivered,
                        interrupted = report.interrupted,
                        "Query finished"
                    );
                    Ok(report)
                }
                Err(err) => {
                    error!(error = %err, "Query processing failed");
                    if let Err(notify_err) = self.sink.notify(&query, &self.failure_notice).await {
                        warn!(error = %notify_err, "Failed to send failure notice");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn execute_from<'a>(
        &'a self,
        index: usize,
        query: &'a mut Query,
        report: &'a mut RunReport,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        Box::pin(async move {
            let Some((name, stage)) = self.stages.get(index) else {
                return self.deliver_last(query, report).await;
            };

            match stage.process(query, name).await? {
                StageOutput::Single(StageProcessResult::Continue) => {
                    self.execute_from(index + 1, query, report).await
                }
                StageOutput::Single(StageProcessResult::Interrupt {
                    user_notice,
                    console_notice,
                }) => {
                    self.interrupt(name, query, user_notice, console_notice, report)
                        .await
                }
                StageOutput::Stream(mut stream) => {
                    let outcome = loop {
                        let item = match stream.next(query).await {
                            None => break Ok(()),
                            Some(Err(err)) => break Err(err),
                            Some(Ok(item)) => item,
                        };

                        let step = match item {
                            StageProcessResult::Continue => {
                                self.execute_from(index + 1, query, report).await
                            }
                            StageProcessResult::Interrupt {
                                user_notice,
                                console_notice,
                            } => {
                                let result = self
                                    .interrupt(name, query, user_notice, console_notice, report)
                                    .await;
                                break result;
                            }
                        };
                        if let Err(err) = step {
                            break Err(err);
                        }
                    };
                    stream.close().await;
                    outcome
                }
            }
        })
    }

    async fn interrupt(
        &self,
        stage: &str,
        query: &Query,
        user_notice: Option<String>,
        console_notice: Option<String>,
        report: &mut RunReport,
    ) -> PipelineResult<()> {
        report.interrupted = true;

        if let Some(notice) = console_notice.filter(|n| !n.is_empty()) {
            info!(stage, notice = %notice, "Query interrupted");
        } else {
            debug!(stage, "Query interrupted");
        }

        if let Some(notice) = user_notice.filter(|n| !n.is_empty()) {
            self.sink
                .notify(query, &notice)
                .await
                .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        }
        Ok(())
    }

    async fn deliver_last(&self, query: &Query, report: &mut RunReport) -> PipelineResult<()> {
        let Some(response) = query.last_response() else {
            debug!("No response to deliver");
            return Ok(());
        };

        self.sink
            .deliver(query, response)
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        report.delivered += 1;
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names().collect::<Vec<_>>())
            .finish()
    }
}
