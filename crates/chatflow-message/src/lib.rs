//! Message model for chatflow.
//!
//! - [`MessageComponent`]: a closed set of message pieces (text, mentions,
//!   media, quotes, platform-specific cards)
//! - [`MessageChain`]: an ordered, mutable sequence of components
//! - [`ImageData`] / [`VoiceData`]: media with a single content source and
//!   on-demand byte resolution

pub mod chain;
pub mod component;
pub mod error;
pub mod media;

pub use chain::{ChainPart, MessageChain, Selector};
pub use component::{
    AtData, ComponentKind, FileData, ForwardData, ForwardDisplay, ForwardNode, Id,
    MessageComponent, PlainData, QuoteData, SourceData, UnknownData, WeChatAppMsgData,
    WeChatEmojiData, WeChatFileData, WeChatForwardMiniProgramsData, WeChatLinkData,
    WeChatMiniProgramsData, WeChatXmlData,
};
pub use error::{MessageError, MessageResult};
pub use media::{ImageData, MediaSource, VoiceData};
