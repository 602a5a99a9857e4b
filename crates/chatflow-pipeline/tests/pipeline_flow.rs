//! End-to-end runs through the standard pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use chatflow_message::{MessageChain, MessageComponent};
use chatflow_pipeline::{
    BoxError, ChatMessage, ChatMessageHandler, ChatRequest, ChatRunner, CommandExecutor,
    CommandHandler, CommandInvocation, CommandReturn, ContentFilter, ContentFilterStage,
    EnableStage, FilterRegistry, FilterResult, MessageHandler, Pipeline, PipelineConfig,
    PipelineError, PipelineResult, Processor, Query, Reply, ReplySink, Response, ResultCursor,
    RunReport, SessionInfo, StageProcessResult, StageStream,
};

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
    fail_delivery: AtomicBool,
}

impl RecordingSink {
    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn deliver(&self, _query: &Query, response: &Response) -> Result<(), BoxError> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err("platform rejected message".into());
        }
        let text = match response {
            Response::Message(message) => message.text().unwrap_or_default().to_string(),
            Response::Chain(chain) => chain.to_string(),
        };
        self.delivered.lock().unwrap().push(text);
        Ok(())
    }

    async fn notify(&self, _query: &Query, notice: &str) -> Result<(), BoxError> {
        self.notices.lock().unwrap().push(notice.to_string());
        Ok(())
    }
}

/// Replies with two fragments, or fails when asked to.
struct Echo;

impl ChatRunner for Echo {
    fn run(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatMessage, BoxError>> {
        let text = request.user_message.text().unwrap_or_default().to_string();
        if text == "crash" {
            return futures::stream::iter(vec![Err::<ChatMessage, BoxError>("model offline".into())])
                .boxed();
        }
        futures::stream::iter(vec![
            Ok(ChatMessage::assistant(format!("you said: {text}"))),
            Ok(ChatMessage::assistant("darn, that is all")),
        ])
        .boxed()
    }
}

struct Help;

impl CommandExecutor for Help {
    fn execute(
        &self,
        invocation: CommandInvocation,
        _session: &SessionInfo,
    ) -> BoxStream<'static, Result<CommandReturn, BoxError>> {
        let item = match invocation.command.as_str() {
            "help" => CommandReturn::text("commands: help"),
            other => CommandReturn::error(format!("unknown command: {other}")),
        };
        futures::stream::iter(vec![Ok(item)]).boxed()
    }
}

/// Masks "darn" in replies and blocks inbound messages containing "forbidden".
struct BanWords;

#[async_trait]
impl ContentFilter for BanWords {
    fn name(&self) -> &str {
        "ban-word-filter"
    }

    async fn process(&self, _query: &Query, message: &str) -> Result<FilterResult, BoxError> {
        if message.contains("forbidden") {
            return Ok(FilterResult::block(
                "Your message contains forbidden words.",
                "ban-word-filter blocked a message",
            ));
        }
        if message.contains("darn") {
            return Ok(FilterResult::masked(message.replace("darn", "****")));
        }
        Ok(FilterResult::pass(message))
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.command.prefix = vec!["/".to_string(), "!".to_string()];
    config.safety.content_filter.check_sensitive_words = true;
    config.trigger.ignore_rules.prefix = vec!["#".to_string()];
    config
}

async fn standard_pipeline(sink: Arc<RecordingSink>) -> (Pipeline, Arc<PipelineConfig>) {
    let config = config();
    let registry = FilterRegistry::with_builtin().with("ban-word-filter", |_: &PipelineConfig| {
        Box::new(BanWords) as Box<dyn ContentFilter>
    });
    let processor = Processor::new(
        CommandHandler::new(Help),
        ChatMessageHandler::new(Echo),
    );
    let pipeline = Pipeline::standard(ContentFilterStage::new(registry), processor, sink, &config)
        .await
        .unwrap();
    (pipeline, Arc::new(config))
}

fn query(id: u64, chain: MessageChain, config: &Arc<PipelineConfig>) -> Query {
    Query::new(id, SessionInfo::person("u1"), chain, Arc::clone(config))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_chat_replies_are_filtered_and_delivered() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    let report = pipeline
        .run(query(1, MessageChain::from(" hello "), &config))
        .await
        .unwrap();

    assert_eq!(
        report,
        RunReport {
            delivered: 2,
            interrupted: false
        }
    );
    assert_eq!(sink.delivered(), vec!["you said: hello", "****, that is all"]);
    assert!(sink.notices().is_empty());
}

#[tokio::test]
async fn test_stage_order() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, _) = standard_pipeline(sink).await;
    assert_eq!(
        pipeline.stage_names().collect::<Vec<_>>(),
        vec![
            "PreContentFilterStage",
            "MessageProcessor",
            "PostContentFilterStage"
        ]
    );
}

#[tokio::test]
async fn test_command_route() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    pipeline
        .run(query(2, MessageChain::from("/help"), &config))
        .await
        .unwrap();
    pipeline
        .run(query(3, MessageChain::from("!nope"), &config))
        .await
        .unwrap();

    assert_eq!(
        sink.delivered(),
        vec!["commands: help", "unknown command: nope"]
    );
}

#[tokio::test]
async fn test_pre_filter_block_notifies_user() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    let report = pipeline
        .run(query(4, MessageChain::from("something forbidden"), &config))
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.delivered, 0);
    assert_eq!(sink.notices(), vec!["Your message contains forbidden words."]);
}

#[tokio::test]
async fn test_ignore_rule_drops_silently() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    let report = pipeline
        .run(query(5, MessageChain::from("#private note"), &config))
        .await
        .unwrap();

    assert!(report.interrupted);
    assert!(sink.delivered().is_empty());
    assert!(sink.notices().is_empty());
}

#[tokio::test]
async fn test_non_text_message_skips_filters() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    // Inbound "darn" would be masked (and so interrupted) if the chain were
    // filtered; the reply still goes through the post filter.
    let chain =
        MessageChain::from("darn").with(MessageComponent::image_url("http://example.com/cat.png"));
    let report = pipeline.run(query(6, chain, &config)).await.unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.delivered, 2);
    assert_eq!(sink.delivered()[0], "you said: ****[image]");
}

#[tokio::test]
async fn test_handler_failure_sends_generic_notice() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;

    let err = pipeline
        .run(query(7, MessageChain::from("crash"), &config))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Handler { handler: "chat", .. }));
    assert_eq!(sink.notices().len(), 1);
    assert!(sink.delivered().is_empty());
}

#[tokio::test]
async fn test_concurrent_queries() {
    let sink = Arc::new(RecordingSink::default());
    let (pipeline, config) = standard_pipeline(sink.clone()).await;
    let pipeline = Arc::new(pipeline);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            let query = query(100 + i, MessageChain::from(format!("q{i}")), &config);
            tokio::spawn(async move { pipeline.run(query).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().delivered, 2);
    }
    assert_eq!(sink.delivered().len(), 16);
}

// ============================================================================
// Stream semantics
// ============================================================================

/// Yields `Continue` items (appending a reply each time), then an interrupt,
/// and records whether it was closed.
struct Scripted {
    items: Vec<Reply>,
    closed: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl ResultCursor for Scripted {
    async fn next(&mut self, query: &mut Query) -> Option<PipelineResult<StageProcessResult>> {
        if self.items.is_empty() {
            return None;
        }
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(Ok(match self.items.remove(0) {
            Reply::Response(response) => {
                query.push_response(response);
                StageProcessResult::Continue
            }
            Reply::Interrupt {
                user_notice,
                console_notice,
            } => StageProcessResult::interrupt(user_notice, console_notice),
        }))
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedHandler {
    items: Vec<Reply>,
    closed: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, _query: &Query) -> PipelineResult<StageStream> {
        Ok(StageStream::new(Scripted {
            items: self.items.clone(),
            closed: self.closed.clone(),
            pulled: self.pulled.clone(),
        }))
    }
}

async fn scripted_pipeline(
    items: Vec<Reply>,
    sink: Arc<RecordingSink>,
) -> (Pipeline, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let closed = Arc::new(AtomicUsize::new(0));
    let pulled = Arc::new(AtomicUsize::new(0));
    let handler = || ScriptedHandler {
        items: items.clone(),
        closed: closed.clone(),
        pulled: pulled.clone(),
    };
    let processor = Processor::new(handler(), handler());
    let pipeline = Pipeline::standard(
        ContentFilterStage::new(FilterRegistry::with_builtin()),
        processor,
        sink,
        &PipelineConfig::default(),
    )
    .await
    .unwrap();
    (pipeline, closed, pulled)
}

#[tokio::test]
async fn test_stream_interrupt_stops_and_closes() {
    let sink = Arc::new(RecordingSink::default());
    let items = vec![
        Reply::from(ChatMessage::assistant("first")),
        Reply::Interrupt {
            user_notice: Some("stopping here".into()),
            console_notice: Some("handler gave up".into()),
        },
        Reply::from(ChatMessage::assistant("never sent")),
    ];
    let (pipeline, closed, pulled) = scripted_pipeline(items, sink.clone()).await;

    let report = pipeline
        .run(Query::new(
            1,
            SessionInfo::group("g", "u"),
            MessageChain::from("hi"),
            Arc::new(PipelineConfig::default()),
        ))
        .await
        .unwrap();

    assert_eq!(
        report,
        RunReport {
            delivered: 1,
            interrupted: true
        }
    );
    assert_eq!(sink.delivered(), vec!["first"]);
    assert_eq!(sink.notices(), vec!["stopping here"]);
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delivery_failure_closes_stream() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_delivery.store(true, Ordering::SeqCst);
    let items = vec![
        Reply::from(ChatMessage::assistant("one")),
        Reply::from(ChatMessage::assistant("two")),
    ];
    let (pipeline, closed, pulled) = scripted_pipeline(items, sink.clone()).await;

    let err = pipeline
        .run(Query::new(
            1,
            SessionInfo::person("u"),
            MessageChain::from("hi"),
            Arc::new(PipelineConfig::default()),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Delivery(_)));
    assert_eq!(pulled.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(sink.notices().len(), 1);
}

#[tokio::test]
async fn test_chain_reply_bypasses_post_filter() {
    let sink = Arc::new(RecordingSink::default());
    let items = vec![Reply::from(MessageChain::from("raw chain reply"))];
    let (pipeline, _, _) = scripted_pipeline(items, sink.clone()).await;

    let report = pipeline
        .run(Query::new(
            1,
            SessionInfo::person("u"),
            MessageChain::from("hi"),
            Arc::new(PipelineConfig::default()),
        ))
        .await
        .unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(sink.delivered(), vec!["raw chain reply"]);
}

#[tokio::test]
async fn test_alias_of_unknown_stage() {
    let sink: Arc<dyn ReplySink> = Arc::new(RecordingSink::default());
    let result = Pipeline::builder(sink)
        .alias("PostContentFilterStage", "PreContentFilterStage")
        .build(&PipelineConfig::default())
        .await;

    assert!(matches!(result, Err(PipelineError::UnknownStage(name)) if name == "PreContentFilterStage"));
}

#[tokio::test]
async fn test_post_filter_only_enabled_filters_run() {
    struct PreOnly;

    #[async_trait]
    impl ContentFilter for PreOnly {
        fn name(&self) -> &str {
            "ban-word-filter"
        }

        fn enable_stages(&self) -> &[EnableStage] {
            &[EnableStage::Pre]
        }

        async fn process(&self, _query: &Query, _message: &str) -> Result<FilterResult, BoxError> {
            Ok(FilterResult::pass("rewritten"))
        }
    }

    let sink = Arc::new(RecordingSink::default());
    let config = config();
    let registry = FilterRegistry::with_builtin().with("ban-word-filter", |_: &PipelineConfig| {
        Box::new(PreOnly) as Box<dyn ContentFilter>
    });
    let pipeline = Pipeline::standard(
        ContentFilterStage::new(registry),
        Processor::new(CommandHandler::new(Help), ChatMessageHandler::new(Echo)),
        sink.clone(),
        &config,
    )
    .await
    .unwrap();

    pipeline
        .run(query(1, MessageChain::from("original"), &Arc::new(config)))
        .await
        .unwrap();

    assert_eq!(
        sink.delivered(),
        vec!["you said: rewritten", "darn, that is all"]
    );
}
