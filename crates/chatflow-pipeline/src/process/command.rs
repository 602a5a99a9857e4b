//! Command handling.
//!
//! Messages starting with a configured prefix are parsed into a
//! [`CommandInvocation`] and handed to a [`CommandExecutor`]. Whatever the
//! executor streams back is appended to the query as `command` messages.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tracing::debug;

use crate::error::{BoxError, PipelineResult};
use crate::query::{ChatMessage, Content, ContentPart, Query, Role, SessionInfo};
use crate::stream::{Reply, StageStream};

use super::handler::MessageHandler;
use super::match_prefix;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The prefix that marked the message as a command.
    pub prefix: String,
    /// First word after the prefix.
    pub command: String,
    /// Remaining words, shell-split.
    pub params: Vec<String>,
    /// Full text after the prefix.
    pub text: String,
}

impl CommandInvocation {
    /// Parses the text following `prefix`.
    pub fn parse(prefix: impl Into<String>, text: &str) -> Self {
        let text = text.trim().to_string();
        let mut words = shell_split(&text).into_iter();
        let command = words.next().unwrap_or_default();
        Self {
            prefix: prefix.into(),
            command,
            params: words.collect(),
            text,
        }
    }
}

/// One item produced by a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReturn {
    pub text: Option<String>,
    pub image_url: Option<String>,
    /// Shown to the user in place of output.
    pub error: Option<String>,
}

impl CommandReturn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Renders this item as a `command` message.
    pub fn into_message(self) -> ChatMessage {
        if let Some(error) = self.error {
            return ChatMessage::command(error);
        }

        match (self.text, self.image_url) {
            (text, Some(image_url)) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(text) = text {
                    parts.push(ContentPart::Text { text });
                }
                parts.push(ContentPart::ImageUrl { image_url });
                ChatMessage {
                    role: Role::Command,
                    content: Some(Content::Parts(parts)),
                }
            }
            (Some(text), None) => ChatMessage::command(text),
            (None, None) => ChatMessage {
                role: Role::Command,
                content: None,
            },
        }
    }
}

/// Runs commands.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Starts executing `invocation` on behalf of `session`.
    fn execute(
        &self,
        invocation: CommandInvocation,
        session: &SessionInfo,
    ) -> BoxStream<'static, Result<CommandReturn, BoxError>>;
}

/// Handler for prefixed messages.
pub struct CommandHandler<E> {
    executor: Arc<E>,
}

impl<E: CommandExecutor> CommandHandler<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    pub fn from_arc(executor: Arc<E>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<E: CommandExecutor> MessageHandler for CommandHandler<E> {
    async fn handle(&self, query: &Query) -> PipelineResult<StageStream> {
        let text = query.message_chain().to_string();
        let text = text.trim();
        let prefixes = &query.pipeline_config().command.prefix;

        let (prefix, rest) = match match_prefix(prefixes, text) {
            Some(prefix) => (prefix.to_string(), &text[prefix.len()..]),
            None => (String::new(), text),
        };
        let invocation = CommandInvocation::parse(prefix, rest);
        debug!(
            query_id = query.query_id(),
            command = %invocation.command,
            params = ?invocation.params,
            "Executing command"
        );

        let replies = self
            .executor
            .execute(invocation, query.session())
            .map(|item| item.map(|ret| Reply::from(ret.into_message())));
        Ok(StageStream::from_replies("command", replies))
    }
}

/// Splits a command line into words, honouring quotes.
///
/// Single quotes are literal; inside double quotes a backslash escapes the
/// next character.
fn shell_split(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut single = false;
    let mut double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if double => escaped = true,
            '\'' if !double => {
                single = !single;
                quoted = true;
            }
            '"' if !single => {
                double = !double;
                quoted = true;
            }
            c if c.is_whitespace() && !single && !double => {
                if !current.is_empty() || quoted {
                    words.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        words.push(current);
    }

    words
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::PipelineError;
    use crate::query::Response;
    use crate::stage::StageProcessResult;
    use chatflow_message::MessageChain;
    use std::sync::Mutex;

    #[test]
    fn test_shell_split() {
        assert_eq!(shell_split("a b  c"), vec!["a", "b", "c"]);
        assert_eq!(shell_split(r#"say "hello world" 'x y'"#), vec!["say", "hello world", "x y"]);
        assert_eq!(shell_split(r#""a \"b\"""#), vec![r#"a "b""#]);
        assert_eq!(shell_split(r#"set name """#), vec!["set", "name", ""]);
        assert!(shell_split("   ").is_empty());
    }

    #[test]
    fn test_invocation_parse() {
        let inv = CommandInvocation::parse("!", "plugin  on 'my plugin' ");
        assert_eq!(inv.prefix, "!");
        assert_eq!(inv.command, "plugin");
        assert_eq!(inv.params, vec!["on", "my plugin"]);
        assert_eq!(inv.text, "plugin  on 'my plugin'");

        let empty = CommandInvocation::parse("!", "");
        assert_eq!(empty.command, "");
        assert!(empty.params.is_empty());
    }

    #[test]
    fn test_command_return_rendering() {
        assert_eq!(CommandReturn::text("ok").into_message().text(), Some("ok"));
        assert_eq!(
            CommandReturn::error("bad args").into_message().text(),
            Some("bad args")
        );

        let image = CommandReturn {
            text: Some("see".into()),
            image_url: Some("http://x/y.png".into()),
            error: None,
        }
        .into_message();
        assert_eq!(image.role, Role::Command);
        assert_eq!(
            image.content,
            Some(Content::Parts(vec![
                ContentPart::Text { text: "see".into() },
                ContentPart::ImageUrl {
                    image_url: "http://x/y.png".into()
                },
            ]))
        );
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<CommandInvocation>>,
    }

    impl CommandExecutor for Recording {
        fn execute(
            &self,
            invocation: CommandInvocation,
            _session: &SessionInfo,
        ) -> BoxStream<'static, Result<CommandReturn, BoxError>> {
            let reply = format!("ran {}", invocation.command);
            self.seen.lock().unwrap().push(invocation);
            futures::stream::iter(vec![
                Ok(CommandReturn::text(reply)),
                Ok(CommandReturn::error("second item failed")),
                Err("executor crashed".into()),
            ])
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_handler_strips_prefix_and_streams() {
        let executor = Arc::new(Recording::default());
        let handler = CommandHandler::from_arc(executor.clone());

        let mut config = PipelineConfig::default();
        config.command.prefix = vec!["/".into(), "!".into()];
        let mut query = Query::new(
            3,
            SessionInfo::person("u1"),
            MessageChain::from(" !help me "),
            Arc::new(config),
        );

        let mut stream = handler.handle(&query).await.unwrap();
        assert_eq!(
            stream.next(&mut query).await.unwrap().unwrap(),
            StageProcessResult::Continue
        );
        assert_eq!(query.last_response().and_then(Response::text), Some("ran help"));

        assert_eq!(
            stream.next(&mut query).await.unwrap().unwrap(),
            StageProcessResult::Continue
        );
        assert_eq!(
            query.last_response().and_then(Response::text),
            Some("second item failed")
        );

        let err = stream.next(&mut query).await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Handler { handler: "command", .. }));

        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[0].prefix, "!");
        assert_eq!(seen[0].params, vec!["me"]);
    }
}
