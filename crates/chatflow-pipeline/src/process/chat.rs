//! Chat handling: everything that is not a command goes to a [`ChatRunner`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;

use crate::error::{BoxError, PipelineResult};
use crate::query::{ChatMessage, Query, SessionInfo};
use crate::stream::{Reply, StageStream};

use super::handler::MessageHandler;

/// What a chat backend receives for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub session: SessionInfo,
    pub query_id: u64,
    pub user_message: ChatMessage,
    pub variables: HashMap<String, Value>,
}

/// A chat backend producing assistant messages.
pub trait ChatRunner: Send + Sync + 'static {
    fn run(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatMessage, BoxError>>;
}

/// Handler for ordinary conversation.
pub struct ChatMessageHandler<R> {
    runner: Arc<R>,
}

impl<R: ChatRunner> ChatMessageHandler<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    pub fn from_arc(runner: Arc<R>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl<R: ChatRunner> MessageHandler for ChatMessageHandler<R> {
    async fn handle(&self, query: &Query) -> PipelineResult<StageStream> {
        let user_message = match query.user_message() {
            Some(message) => message.clone(),
            None => ChatMessage::user(query.message_chain().to_string().trim()),
        };

        let request = ChatRequest {
            session: query.session().clone(),
            query_id: query.query_id(),
            user_message,
            variables: query.variables().clone(),
        };

        let replies = self
            .runner
            .run(request)
            .map(|item| item.map(Reply::from));
        Ok(StageStream::from_replies("chat", replies))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::PipelineError;
    use crate::query::{Response, Role};
    use crate::stage::StageProcessResult;
    use chatflow_message::MessageChain;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo {
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ChatRunner for Echo {
        fn run(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatMessage, BoxError>> {
            let text = request.user_message.text().unwrap_or_default().to_string();
            self.requests.lock().unwrap().push(request);
            futures::stream::iter(vec![
                Ok(ChatMessage::assistant(format!("echo: {text}"))),
                Ok(ChatMessage::assistant("done")),
            ])
            .boxed()
        }
    }

    struct Failing;

    impl ChatRunner for Failing {
        fn run(&self, _request: ChatRequest) -> BoxStream<'static, Result<ChatMessage, BoxError>> {
            futures::stream::once(async { Err::<ChatMessage, BoxError>("model offline".into()) })
                .boxed()
        }
    }

    fn query(text: &str) -> Query {
        Query::new(
            11,
            SessionInfo::group("g", "u"),
            MessageChain::from(text),
            Arc::new(PipelineConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_each_message_is_appended() {
        let runner = Arc::new(Echo::default());
        let handler = ChatMessageHandler::from_arc(runner.clone());
        let mut query = query("  hi there ");

        let mut stream = handler.handle(&query).await.unwrap();
        let mut results = Vec::new();
        while let Some(result) = stream.next(&mut query).await {
            results.push(result.unwrap());
        }

        assert_eq!(results, vec![StageProcessResult::Continue; 2]);
        let texts: Vec<_> = query.resp_messages().iter().filter_map(Response::text).collect();
        assert_eq!(texts, vec!["echo: hi there", "done"]);

        let requests = runner.requests.lock().unwrap();
        assert_eq!(requests[0].query_id, 11);
        assert_eq!(requests[0].user_message.role, Role::User);
    }

    #[tokio::test]
    async fn test_explicit_user_message_wins() {
        let runner = Arc::new(Echo::default());
        let handler = ChatMessageHandler::from_arc(runner.clone());
        let mut query = query("chain text").with_user_message(ChatMessage::user("provider text"));

        let mut stream = handler.handle(&query).await.unwrap();
        stream.next(&mut query).await.unwrap().unwrap();
        stream.close().await;

        assert_eq!(
            query.last_response().and_then(Response::text),
            Some("echo: provider text")
        );
        assert_eq!(query.resp_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_runner_error_is_handler_fault() {
        let handler = ChatMessageHandler::new(Failing);
        let mut query = query("hi");

        let mut stream = handler.handle(&query).await.unwrap();
        let err = stream.next(&mut query).await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Handler { handler: "chat", .. }));
        assert!(query.resp_messages().is_empty());
    }
}
