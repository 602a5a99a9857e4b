//! Pull-based result streams.
//!
//! Handlers produce their output lazily. The consumer pulls one
//! [`StageProcessResult`] at a time with [`StageStream::next`], lending the
//! query to the producer for the duration of the pull, and may stop early
//! with [`StageStream::close`]. Producers release their resources in
//! [`ResultCursor::close`]. Dropping a stream without closing it drops the
//! producer as well.

use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::debug;

use chatflow_message::MessageChain;

use crate::error::{PipelineError, PipelineResult};
use crate::query::{ChatMessage, Query, Response};
use crate::stage::StageProcessResult;

/// Producer side of a [`StageStream`].
#[async_trait]
pub trait ResultCursor: Send {
    /// Produces the next result, or `None` once exhausted.
    async fn next(&mut self, query: &mut Query) -> Option<PipelineResult<StageProcessResult>>;

    /// Releases producer resources. Called at most once.
    async fn close(&mut self) {}
}

/// A lazy, closable sequence of stage results.
pub struct StageStream {
    cursor: Option<Box<dyn ResultCursor>>,
}

impl StageStream {
    /// Wraps a cursor.
    pub fn new(cursor: impl ResultCursor + 'static) -> Self {
        Self {
            cursor: Some(Box::new(cursor)),
        }
    }

    /// A stream that yields nothing.
    pub fn empty() -> Self {
        Self { cursor: None }
    }

    /// A stream over precomputed results.
    pub fn from_results(
        results: impl IntoIterator<Item = PipelineResult<StageProcessResult>>,
    ) -> Self {
        Self::new(Fixed {
            results: results.into_iter().collect(),
        })
    }

    /// Adapts a stream of [`Reply`] items.
    ///
    /// Each `Reply::Response` is appended to the query's responses and
    /// yields `Continue`; `Reply::Interrupt` yields an interrupt; an error
    /// becomes a [`PipelineError::Handler`] attributed to `handler`.
    pub fn from_replies<S, E>(handler: &'static str, stream: S) -> Self
    where
        S: Stream<Item = Result<Reply, E>> + Send + 'static,
        E: Display + 'static,
    {
        Self::new(ReplyCursor {
            handler,
            stream: Some(stream.map(|item| item.map_err(|e| e.to_string())).boxed()),
        })
    }

    /// Pulls the next result. Returns `None` once exhausted or closed.
    ///
    /// An exhausted producer is closed automatically.
    pub async fn next(&mut self, query: &mut Query) -> Option<PipelineResult<StageProcessResult>> {
        let cursor = self.cursor.as_mut()?;
        let item = cursor.next(query).await;
        if item.is_none() {
            self.close().await;
        }
        item
    }

    /// Stops the stream early and releases the producer.
    pub async fn close(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}

impl std::fmt::Debug for StageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// One item produced by a handler backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A reply fragment to append to the query.
    Response(Response),
    /// Stop processing with the given notices.
    Interrupt {
        user_notice: Option<String>,
        console_notice: Option<String>,
    },
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<ChatMessage> for Reply {
    fn from(message: ChatMessage) -> Self {
        Reply::Response(Response::Message(message))
    }
}

impl From<MessageChain> for Reply {
    fn from(chain: MessageChain) -> Self {
        Reply::Response(Response::Chain(chain))
    }
}

// ============================================================================
// Cursors
// ============================================================================

struct Fixed {
    results: VecDeque<PipelineResult<StageProcessResult>>,
}

#[async_trait]
impl ResultCursor for Fixed {
    async fn next(&mut self, _query: &mut Query) -> Option<PipelineResult<StageProcessResult>> {
        self.results.pop_front()
    }
}

struct ReplyCursor {
    handler: &'static str,
    stream: Option<BoxStream<'static, Result<Reply, String>>>,
}

#[async_trait]
impl ResultCursor for ReplyCursor {
    async fn next(&mut self, query: &mut Query) -> Option<PipelineResult<StageProcessResult>> {
        let item = self.stream.as_mut()?.next().await?;
        Some(match item {
            Ok(Reply::Response(response)) => {
                query.push_response(response);
                Ok(StageProcessResult::Continue)
            }
            Ok(Reply::Interrupt {
                user_notice,
                console_notice,
            }) => Ok(StageProcessResult::interrupt(user_notice, console_notice)),
            Err(reason) => Err(PipelineError::handler(self.handler, reason)),
        })
    }

    async fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(handler = self.handler, "Reply stream released");
        }
    }
}
