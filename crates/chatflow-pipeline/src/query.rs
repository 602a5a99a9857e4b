//! The query: everything one pipeline run reads and mutates.
//!
//! Stages receive `&mut Query`. Fields that have rules about how they may
//! change (the inbound chain, the response list) are private and only
//! reachable through narrow mutators.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatflow_message::MessageChain;

use crate::config::PipelineConfig;

// ============================================================================
// Session identity
// ============================================================================

/// Whether the conversation is private or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherType {
    Person,
    Group,
}

impl LauncherType {
    pub const fn as_str(self) -> &'static str {
        match self {
            LauncherType::Person => "person",
            LauncherType::Group => "group",
        }
    }
}

impl fmt::Display for LauncherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies who sent a query and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub launcher_type: LauncherType,
    pub launcher_id: String,
    pub sender_id: String,
}

impl SessionInfo {
    /// Creates a session for a private conversation.
    pub fn person(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            launcher_type: LauncherType::Person,
            launcher_id: id.clone(),
            sender_id: id,
        }
    }

    /// Creates a session for a group conversation.
    pub fn group(group_id: impl Into<String>, sender_id: impl Into<String>) -> Self {
        Self {
            launcher_type: LauncherType::Group,
            launcher_id: group_id.into(),
            sender_id: sender_id.into(),
        }
    }
}

// ============================================================================
// Provider messages
// ============================================================================

/// Author role of a provider message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Command,
    Tool,
}

/// One element of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
    ImageBase64 { image_base64: String },
}

/// Body of a provider message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A message in the form chat providers consume and produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(Content::Text(content.into())),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn command(content: impl Into<String>) -> Self {
        Self::new(Role::Command, content)
    }

    /// Returns the text if the content is a plain string.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(Content::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// An element of a query's response list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A provider message.
    Message(ChatMessage),
    /// A ready-made platform chain.
    Chain(MessageChain),
}

impl Response {
    /// Returns the text if this is a provider message with text content.
    pub fn text(&self) -> Option<&str> {
        match self {
            Response::Message(message) => message.text(),
            Response::Chain(_) => None,
        }
    }
}

impl From<ChatMessage> for Response {
    fn from(message: ChatMessage) -> Self {
        Response::Message(message)
    }
}

impl From<MessageChain> for Response {
    fn from(chain: MessageChain) -> Self {
        Response::Chain(chain)
    }
}

// ============================================================================
// Query
// ============================================================================

/// One inbound message and the state accumulated while processing it.
#[derive(Debug, Clone)]
pub struct Query {
    query_id: u64,
    session: SessionInfo,
    message_chain: MessageChain,
    user_message: Option<ChatMessage>,
    resp_messages: Vec<Response>,
    pipeline_config: Arc<PipelineConfig>,
    variables: HashMap<String, Value>,
}

impl Query {
    /// Creates a query for an inbound chain.
    pub fn new(
        query_id: u64,
        session: SessionInfo,
        message_chain: MessageChain,
        pipeline_config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            query_id,
            session,
            message_chain,
            user_message: None,
            resp_messages: Vec::new(),
            pipeline_config,
            variables: HashMap::new(),
        }
    }

    /// Sets the provider-facing rendering of the inbound message.
    pub fn with_user_message(mut self, message: ChatMessage) -> Self {
        self.user_message = Some(message);
        self
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn launcher_type(&self) -> LauncherType {
        self.session.launcher_type
    }

    pub fn launcher_id(&self) -> &str {
        &self.session.launcher_id
    }

    pub fn sender_id(&self) -> &str {
        &self.session.sender_id
    }

    pub fn message_chain(&self) -> &MessageChain {
        &self.message_chain
    }

    /// Replaces the inbound chain wholesale.
    pub fn replace_message_chain(&mut self, chain: MessageChain) {
        self.message_chain = chain;
    }

    pub fn user_message(&self) -> Option<&ChatMessage> {
        self.user_message.as_ref()
    }

    pub fn pipeline_config(&self) -> &Arc<PipelineConfig> {
        &self.pipeline_config
    }

    pub fn resp_messages(&self) -> &[Response] {
        &self.resp_messages
    }

    /// Appends a response.
    pub fn push_response(&mut self, response: impl Into<Response>) {
        self.resp_messages.push(response.into());
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.resp_messages.last()
    }

    /// Overwrites the text of the last response.
    ///
    /// Returns false, leaving the query untouched, unless the last response
    /// is a provider message with text content.
    pub fn set_last_response_text(&mut self, text: impl Into<String>) -> bool {
        match self.resp_messages.last_mut() {
            Some(Response::Message(ChatMessage {
                content: Some(Content::Text(current)),
                ..
            })) => {
                *current = text.into();
                true
            }
            _ => false,
        }
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.variables
    }
}
