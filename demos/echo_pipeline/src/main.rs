//! Echo Pipeline Demo
//!
//! Reads lines from stdin, runs each through the full pipeline and prints the
//! replies. Lines starting with a command prefix (`!` by default) go to the
//! built-in commands; everything else is echoed back by a fake chat backend.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-pipeline -- --config demos/echo_pipeline/chatflow.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chatflow::pipeline::{BAN_WORD_FILTER, Content, ContentPart};
use chatflow::prelude::*;
use clap::Parser;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Run the chatflow pipeline against stdin")]
struct Args {
    /// Configuration file; searched for in the current directory if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Sender id used for every line read.
    #[arg(long, default_value = "console")]
    user: String,
}

// ============================================================================
// Collaborators
// ============================================================================

/// Answers every message with the text it received, in two fragments.
struct EchoRunner;

impl ChatRunner for EchoRunner {
    fn run(&self, request: ChatRequest) -> BoxStream<'static, Result<ChatMessage, BoxError>> {
        let text = request.user_message.text().unwrap_or_default().to_string();
        stream::iter(vec![
            Ok(ChatMessage::assistant(format!("You said: {text}"))),
            Ok(ChatMessage::assistant(format!(
                "({} characters, query #{})",
                text.chars().count(),
                request.query_id
            ))),
        ])
        .boxed()
    }
}

/// `help`, `echo <words>`, `whoami` and `cat`.
struct DemoCommands;

impl CommandExecutor for DemoCommands {
    fn execute(
        &self,
        invocation: CommandInvocation,
        session: &SessionInfo,
    ) -> BoxStream<'static, Result<CommandReturn, BoxError>> {
        let reply = match invocation.command.as_str() {
            "help" => CommandReturn::text("commands: help, echo <words>, whoami, cat"),
            "echo" => CommandReturn::text(invocation.params.join(" ")),
            "whoami" => CommandReturn::text(format!(
                "{}_{} (sender {})",
                session.launcher_type, session.launcher_id, session.sender_id
            )),
            "cat" => CommandReturn::image("https://cataas.com/cat"),
            other => CommandReturn::error(format!("unknown command: {other}")),
        };
        stream::iter(vec![Ok(reply)]).boxed()
    }
}

/// Masks a fixed word list; enabled by `check-sensitive-words`.
struct WordMask {
    words: Vec<&'static str>,
}

#[async_trait]
impl ContentFilter for WordMask {
    fn name(&self) -> &str {
        BAN_WORD_FILTER
    }

    async fn process(&self, _query: &Query, message: &str) -> Result<FilterResult, BoxError> {
        let mut masked = message.to_string();
        for word in &self.words {
            masked = masked.replace(word, &"*".repeat(word.chars().count()));
        }
        if masked == message {
            Ok(FilterResult::pass(message))
        } else {
            Ok(FilterResult::masked(masked))
        }
    }
}

/// Prints replies to stdout.
struct StdoutSink;

#[async_trait]
impl ReplySink for StdoutSink {
    async fn deliver(&self, _query: &Query, response: &Response) -> Result<(), BoxError> {
        match response {
            Response::Message(message) => match &message.content {
                Some(content) => println!("bot> {}", render_content(content)),
                None => println!("bot> (empty)"),
            },
            Response::Chain(chain) => println!("bot> {chain}"),
        }
        Ok(())
    }

    async fn notify(&self, _query: &Query, notice: &str) -> Result<(), BoxError> {
        println!("bot! {notice}");
        Ok(())
    }
}

fn render_content(content: &Content) -> String {
    match content {
        Content::Text(text) => text.clone(),
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::ImageUrl { image_url } => format!("[image {image_url}]"),
                ContentPart::ImageBase64 { .. } => "[image]".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ChatflowRuntime::builder().filter(BAN_WORD_FILTER, |_| {
        Box::new(WordMask {
            words: vec!["darn", "heck"],
        }) as Box<dyn ContentFilter>
    });
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder
        .build(
            CommandHandler::new(DemoCommands),
            ChatMessageHandler::new(EchoRunner),
            Arc::new(StdoutSink),
        )
        .await?;

    info!(
        prefixes = ?runtime.config().pipeline.command.prefix,
        "Type a message, or a command such as !help. Ctrl+D to quit."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = ChatflowRuntime::shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let query = runtime.query(SessionInfo::person(args.user.clone()), line.into());
                if let Err(e) = runtime.handle(query).await {
                    warn!(error = %e, "Query failed");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    runtime.drain().await;
    Ok(())
}
