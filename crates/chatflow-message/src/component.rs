//! Message component types.
//!
//! A [`MessageComponent`] is one atomic piece of a message: a run of text, a
//! mention, an image, a quoted message and so on. The set of variants is
//! closed; the wire form is a JSON record `{"type": "<Tag>", ...fields}`.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatflow_message::MessageComponent;
//!
//! let text = MessageComponent::plain("Hello, ");
//! let at = MessageComponent::at(10001000);
//! assert_eq!(format!("{text}{at}"), "Hello, @10001000");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::MessageChain;
use crate::error::{MessageError, MessageResult};
use crate::media::{ImageData, MediaSource, VoiceData};

// ============================================================================
// Id
// ============================================================================

/// An identifier that the wire may carry either as an integer or a string.
///
/// The original representation is preserved so that serializing a parsed
/// record yields the same JSON type back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier.
    Str(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(n) => write!(f, "{n}"),
            Id::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Int(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::Str(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::Str(value)
    }
}

// ============================================================================
// Component kinds
// ============================================================================

/// The discriminant of a [`MessageComponent`], without its data.
///
/// Used for kind-based queries on a chain and as the tag registry for parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Source,
    Plain,
    At,
    AtAll,
    Quote,
    Image,
    Voice,
    File,
    Forward,
    Unknown,
    WeChatMiniPrograms,
    WeChatForwardMiniPrograms,
    WeChatEmoji,
    WeChatLink,
    WeChatForwardLink,
    WeChatForwardImage,
    WeChatForwardFile,
    WeChatAppMsg,
    WeChatForwardQuote,
    WeChatFile,
}

impl ComponentKind {
    /// Every known kind, in declaration order.
    pub const ALL: [ComponentKind; 20] = [
        ComponentKind::Source,
        ComponentKind::Plain,
        ComponentKind::At,
        ComponentKind::AtAll,
        ComponentKind::Quote,
        ComponentKind::Image,
        ComponentKind::Voice,
        ComponentKind::File,
        ComponentKind::Forward,
        ComponentKind::Unknown,
        ComponentKind::WeChatMiniPrograms,
        ComponentKind::WeChatForwardMiniPrograms,
        ComponentKind::WeChatEmoji,
        ComponentKind::WeChatLink,
        ComponentKind::WeChatForwardLink,
        ComponentKind::WeChatForwardImage,
        ComponentKind::WeChatForwardFile,
        ComponentKind::WeChatAppMsg,
        ComponentKind::WeChatForwardQuote,
        ComponentKind::WeChatFile,
    ];

    /// Returns the wire tag of this kind.
    pub const fn tag(self) -> &'static str {
        match self {
            ComponentKind::Source => "Source",
            ComponentKind::Plain => "Plain",
            ComponentKind::At => "At",
            ComponentKind::AtAll => "AtAll",
            ComponentKind::Quote => "Quote",
            ComponentKind::Image => "Image",
            ComponentKind::Voice => "Voice",
            ComponentKind::File => "File",
            ComponentKind::Forward => "Forward",
            ComponentKind::Unknown => "Unknown",
            ComponentKind::WeChatMiniPrograms => "WeChatMiniPrograms",
            ComponentKind::WeChatForwardMiniPrograms => "WeChatForwardMiniPrograms",
            ComponentKind::WeChatEmoji => "WeChatEmoji",
            ComponentKind::WeChatLink => "WeChatLink",
            ComponentKind::WeChatForwardLink => "WeChatForwardLink",
            ComponentKind::WeChatForwardImage => "WeChatForwardImage",
            ComponentKind::WeChatForwardFile => "WeChatForwardFile",
            ComponentKind::WeChatAppMsg => "WeChatAppMsg",
            ComponentKind::WeChatForwardQuote => "WeChatForwardQuote",
            ComponentKind::WeChatFile => "WeChatFile",
        }
    }

    /// Looks up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// MessageComponent
// ============================================================================

/// A single piece of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageComponent {
    /// Message metadata; conventionally the first element of a chain.
    Source(SourceData),
    /// Plain text.
    Plain(PlainData),
    /// Mention of one user.
    At(AtData),
    /// Mention of everyone.
    AtAll,
    /// Quoted reply to an earlier message.
    Quote(QuoteData),
    /// Image.
    Image(ImageData),
    /// Voice clip.
    Voice(VoiceData),
    /// File attachment.
    File(FileData),
    /// Bundle of forwarded messages.
    Forward(ForwardData),
    /// Content the adapter could not map.
    Unknown(UnknownData),
    WeChatMiniPrograms(WeChatMiniProgramsData),
    WeChatForwardMiniPrograms(WeChatForwardMiniProgramsData),
    WeChatEmoji(WeChatEmojiData),
    WeChatLink(WeChatLinkData),
    WeChatForwardLink(WeChatXmlData),
    WeChatForwardImage(WeChatXmlData),
    WeChatForwardFile(WeChatXmlData),
    WeChatAppMsg(WeChatAppMsgData),
    WeChatForwardQuote(WeChatAppMsgData),
    WeChatFile(WeChatFileData),
}

impl MessageComponent {
    /// Builds a component from an untyped `{type, ...fields}` record.
    ///
    /// A missing or unrecognized tag is [`MessageError::UnknownVariant`]; a
    /// record whose fields do not fit the variant is
    /// [`MessageError::InvalidField`].
    pub fn parse(raw: &Value) -> MessageResult<Self> {
        let Some(record) = raw.as_object() else {
            return Err(MessageError::invalid_field(
                "<record>",
                format!("expected an object, got {raw}"),
            ));
        };

        let tag = match record.get("type") {
            Some(Value::String(tag)) => tag.as_str(),
            Some(other) => return Err(MessageError::UnknownVariant(other.to_string())),
            None => return Err(MessageError::UnknownVariant("<missing>".to_string())),
        };

        let kind =
            ComponentKind::from_tag(tag).ok_or_else(|| MessageError::UnknownVariant(tag.into()))?;

        serde_json::from_value(raw.clone())
            .map_err(|e| MessageError::invalid_field(kind.tag(), e.to_string()))
    }

    /// Returns the kind of this component.
    pub fn kind(&self) -> ComponentKind {
        match self {
            MessageComponent::Source(_) => ComponentKind::Source,
            MessageComponent::Plain(_) => ComponentKind::Plain,
            MessageComponent::At(_) => ComponentKind::At,
            MessageComponent::AtAll => ComponentKind::AtAll,
            MessageComponent::Quote(_) => ComponentKind::Quote,
            MessageComponent::Image(_) => ComponentKind::Image,
            MessageComponent::Voice(_) => ComponentKind::Voice,
            MessageComponent::File(_) => ComponentKind::File,
            MessageComponent::Forward(_) => ComponentKind::Forward,
            MessageComponent::Unknown(_) => ComponentKind::Unknown,
            MessageComponent::WeChatMiniPrograms(_) => ComponentKind::WeChatMiniPrograms,
            MessageComponent::WeChatForwardMiniPrograms(_) => {
                ComponentKind::WeChatForwardMiniPrograms
            }
            MessageComponent::WeChatEmoji(_) => ComponentKind::WeChatEmoji,
            MessageComponent::WeChatLink(_) => ComponentKind::WeChatLink,
            MessageComponent::WeChatForwardLink(_) => ComponentKind::WeChatForwardLink,
            MessageComponent::WeChatForwardImage(_) => ComponentKind::WeChatForwardImage,
            MessageComponent::WeChatForwardFile(_) => ComponentKind::WeChatForwardFile,
            MessageComponent::WeChatAppMsg(_) => ComponentKind::WeChatAppMsg,
            MessageComponent::WeChatForwardQuote(_) => ComponentKind::WeChatForwardQuote,
            MessageComponent::WeChatFile(_) => ComponentKind::WeChatFile,
        }
    }

    /// Returns true if this component only carries text or metadata.
    ///
    /// Content filters only inspect chains made entirely of such components.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            MessageComponent::Plain(_) | MessageComponent::Source(_)
        )
    }

    /// Returns the text if this is a `Plain` component.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageComponent::Plain(data) => Some(&data.text),
            _ => None,
        }
    }

    // ==================== Builders ====================

    /// Creates a plain text component.
    pub fn plain(text: impl Into<String>) -> Self {
        MessageComponent::Plain(PlainData { text: text.into() })
    }

    /// Creates a source component.
    pub fn source(id: impl Into<Id>, time: DateTime<Utc>) -> Self {
        MessageComponent::Source(SourceData {
            id: id.into(),
            time,
        })
    }

    /// Creates a mention.
    pub fn at(target: impl Into<Id>) -> Self {
        MessageComponent::At(AtData {
            target: target.into(),
            display: None,
        })
    }

    /// Creates a mention with display text.
    pub fn at_with_display(target: impl Into<Id>, display: impl Into<String>) -> Self {
        MessageComponent::At(AtData {
            target: target.into(),
            display: Some(display.into()),
        })
    }

    /// Creates a mention of everyone.
    pub const fn at_all() -> Self {
        MessageComponent::AtAll
    }

    /// Creates a quote of an earlier message.
    pub fn quote(id: Option<i64>, origin: MessageChain) -> Self {
        MessageComponent::Quote(QuoteData {
            id,
            group_id: None,
            sender_id: None,
            target_id: None,
            origin,
        })
    }

    /// Creates an image from a remote URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        MessageComponent::Image(ImageData::new(MediaSource::Url(url.into())))
    }

    /// Creates an image from an inline base64 payload.
    pub fn image_base64(data: impl Into<String>) -> Self {
        MessageComponent::Image(ImageData::new(MediaSource::Base64(data.into())))
    }

    /// Creates a voice clip from a remote URL.
    pub fn voice_url(url: impl Into<String>) -> Self {
        MessageComponent::Voice(VoiceData::new(MediaSource::Url(url.into())))
    }

    /// Creates an unknown component.
    pub fn unknown(text: impl Into<String>) -> Self {
        MessageComponent::Unknown(UnknownData { text: text.into() })
    }
}

impl fmt::Display for MessageComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageComponent::Plain(data) => f.write_str(&data.text),
            MessageComponent::At(data) => match &data.display {
                Some(display) if !display.is_empty() => write!(f, "@{display}"),
                _ => write!(f, "@{}", data.target),
            },
            MessageComponent::AtAll => f.write_str("@all"),
            MessageComponent::Image(_) => f.write_str("[image]"),
            MessageComponent::Voice(_) => f.write_str("[voice]"),
            MessageComponent::File(data) => write!(f, "[file]{}", data.name),
            MessageComponent::WeChatFile(data) => write!(f, "[file]{}", data.file_name),
            MessageComponent::Forward(_) => f.write_str("[chat history]"),
            MessageComponent::Unknown(data) => write!(f, "Unknown Message: {}", data.text),
            MessageComponent::WeChatForwardMiniPrograms(data) => f.write_str(&data.xml_data),
            MessageComponent::WeChatForwardLink(data)
            | MessageComponent::WeChatForwardImage(data)
            | MessageComponent::WeChatForwardFile(data) => f.write_str(&data.xml_data),
            MessageComponent::WeChatAppMsg(data) | MessageComponent::WeChatForwardQuote(data) => {
                f.write_str(&data.app_msg)
            }
            MessageComponent::Source(_)
            | MessageComponent::Quote(_)
            | MessageComponent::WeChatMiniPrograms(_)
            | MessageComponent::WeChatEmoji(_)
            | MessageComponent::WeChatLink(_) => Ok(()),
        }
    }
}

impl From<&str> for MessageComponent {
    fn from(text: &str) -> Self {
        MessageComponent::plain(text)
    }
}

impl From<String> for MessageComponent {
    fn from(text: String) -> Self {
        MessageComponent::plain(text)
    }
}

// ============================================================================
// Component data
// ============================================================================

/// Data for the `Source` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceData {
    /// Message id, used when quoting this message.
    pub id: Id,
    /// When the message was sent.
    pub time: DateTime<Utc>,
}

/// Data for the `Plain` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainData {
    pub text: String,
}

/// Data for the `At` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtData {
    /// The mentioned user.
    pub target: Id,
    /// Display text; ignored when sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Data for the `Quote` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Message id of the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Group the quoted message was received in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Id>,
    /// Content of the quoted message.
    pub origin: MessageChain,
}

/// Data for the `File` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: i64,
    pub url: String,
}

/// Display metadata of a forwarded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardDisplay {
    pub title: String,
    pub brief: String,
    pub source: String,
    pub preview: Vec<String>,
    pub summary: String,
}

impl Default for ForwardDisplay {
    fn default() -> Self {
        Self {
            title: "Group chat history".to_string(),
            brief: "[chat history]".to_string(),
            source: "chat history".to_string(),
            preview: Vec::new(),
            summary: "View forwarded messages".to_string(),
        }
    }
}

/// One message inside a forwarded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForwardNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_chain: Option<MessageChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Data for the `Forward` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardData {
    #[serde(default)]
    pub display: ForwardDisplay,
    pub node_list: Vec<ForwardNode>,
}

/// Data for the `Unknown` component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeChatMiniProgramsData {
    pub mini_app_id: String,
    pub user_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub page_path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeChatForwardMiniProgramsData {
    pub xml_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeChatEmojiData {
    pub emoji_md5: String,
    pub emoji_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeChatLinkData {
    pub link_title: String,
    pub link_desc: String,
    pub link_url: String,
    pub link_thumb_url: String,
}

/// Raw XML payload shared by the WeChat forward components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeChatXmlData {
    pub xml_data: String,
}

/// Raw app-message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeChatAppMsgData {
    pub app_msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeChatFileData {
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_path: String,
    pub file_base64: String,
}
