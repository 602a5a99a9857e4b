//! Media-bearing component data (images and voice clips).
//!
//! A media component carries at most one authoritative content source. On the
//! wire the source is spread over optional fields (`image_id`/`voice_id`,
//! `url`, `path`, `base64`); a record that sets more than one of them is
//! rejected rather than silently preferring one.
//!
//! Resolving the actual bytes is a separate, side-effecting step performed on
//! demand through [`ImageData::get_bytes`] / [`VoiceData::get_bytes`].

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MessageError, MessageResult};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const DEFAULT_VOICE_MIME: &str = "audio/silk";

/// Where a media component's content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Opaque platform identifier; only the owning adapter can resolve it.
    Id(String),
    /// Remote URL.
    Url(String),
    /// Local filesystem path.
    Path(PathBuf),
    /// Inline base64 payload, optionally as a `data:<mime>;base64,` URI.
    Base64(String),
}

impl MediaSource {
    /// Resolves the source into raw bytes and a MIME type.
    ///
    /// Inline bytes are decoded, URLs are fetched, and paths are read. An
    /// opaque platform id cannot be resolved here.
    async fn resolve(&self, default_mime: &str) -> MessageResult<(Vec<u8>, String)> {
        match self {
            MediaSource::Base64(payload) => decode_inline(payload, default_mime),
            MediaSource::Url(url) => fetch_remote(url, default_mime).await,
            MediaSource::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|source| MessageError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok((bytes, default_mime.to_string()))
            }
            MediaSource::Id(id) => {
                debug!(id = %id, "Platform media id cannot be resolved without an adapter");
                Err(MessageError::NoContentSource)
            }
        }
    }
}

fn decode_inline(payload: &str, default_mime: &str) -> MessageResult<(Vec<u8>, String)> {
    let (mime, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let split = rest
                .find(";base64,")
                .ok_or_else(|| MessageError::Decode("data URI is not base64 encoded".into()))?;
            (rest[..split].to_string(), &rest[split + ";base64,".len()..])
        }
        None => (default_mime.to_string(), payload),
    };

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| MessageError::Decode(e.to_string()))?;
    Ok((bytes, mime))
}

async fn fetch_remote(url: &str, default_mime: &str) -> MessageResult<(Vec<u8>, String)> {
    let response = reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| MessageError::fetch(url, e))?;

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(default_mime)
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MessageError::fetch(url, e))?;
    Ok((bytes.to_vec(), mime))
}

async fn encode_file(path: &Path) -> MessageResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|source| MessageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(STANDARD.encode(bytes))
}

/// Collapses the optional wire fields into a single source.
fn single_source(
    kind: &str,
    id: Option<String>,
    url: Option<String>,
    path: Option<PathBuf>,
    base64: Option<String>,
) -> Result<Option<MediaSource>, String> {
    let candidates = [
        id.map(MediaSource::Id),
        url.map(MediaSource::Url),
        path.map(MediaSource::Path),
        base64.map(MediaSource::Base64),
    ];
    let mut set = candidates.into_iter().flatten();
    let first = set.next();
    if set.next().is_some() {
        return Err(format!("{kind} carries more than one content source"));
    }
    Ok(first)
}

// ============================================================================
// Image
// ============================================================================

/// Image component data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ImageRecord", into = "ImageRecord")]
pub struct ImageData {
    /// The single content source, if any.
    pub source: Option<MediaSource>,
}

#[derive(Serialize, Deserialize)]
struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64: Option<String>,
}

impl TryFrom<ImageRecord> for ImageData {
    type Error = String;

    fn try_from(r: ImageRecord) -> Result<Self, Self::Error> {
        let source = single_source("image", r.image_id, r.url, r.path, r.base64)?;
        Ok(Self { source })
    }
}

impl From<ImageData> for ImageRecord {
    fn from(data: ImageData) -> Self {
        let mut record = ImageRecord {
            image_id: None,
            url: None,
            path: None,
            base64: None,
        };
        match data.source {
            Some(MediaSource::Id(id)) => record.image_id = Some(id),
            Some(MediaSource::Url(url)) => record.url = Some(url),
            Some(MediaSource::Path(path)) => record.path = Some(path),
            Some(MediaSource::Base64(b64)) => record.base64 = Some(b64),
            None => {}
        }
        record
    }
}

impl ImageData {
    /// Creates image data from a source.
    pub fn new(source: MediaSource) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Loads a local file and carries it inline as base64.
    pub async fn from_local(path: impl AsRef<Path>) -> MessageResult<Self> {
        let encoded = encode_file(path.as_ref()).await?;
        Ok(Self::new(MediaSource::Base64(encoded)))
    }

    /// Carries raw bytes inline as base64.
    pub fn from_bytes(content: &[u8]) -> Self {
        Self::new(MediaSource::Base64(STANDARD.encode(content)))
    }

    /// Resolves the image bytes and MIME type.
    ///
    /// Fails with [`MessageError::NoContentSource`] when no source was set.
    pub async fn get_bytes(&self) -> MessageResult<(Vec<u8>, String)> {
        match &self.source {
            Some(source) => source.resolve(DEFAULT_IMAGE_MIME).await,
            None => Err(MessageError::NoContentSource),
        }
    }
}

// ============================================================================
// Voice
// ============================================================================

/// Voice clip component data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "VoiceRecord", into = "VoiceRecord")]
pub struct VoiceData {
    /// The single content source, if any.
    pub source: Option<MediaSource>,
    /// Clip length in seconds.
    pub length: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct VoiceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<u32>,
}

impl TryFrom<VoiceRecord> for VoiceData {
    type Error = String;

    fn try_from(r: VoiceRecord) -> Result<Self, Self::Error> {
        let source = single_source("voice", r.voice_id, r.url, r.path, r.base64)?;
        Ok(Self {
            source,
            length: r.length,
        })
    }
}

impl From<VoiceData> for VoiceRecord {
    fn from(data: VoiceData) -> Self {
        let mut record = VoiceRecord {
            voice_id: None,
            url: None,
            path: None,
            base64: None,
            length: data.length,
        };
        match data.source {
            Some(MediaSource::Id(id)) => record.voice_id = Some(id),
            Some(MediaSource::Url(url)) => record.url = Some(url),
            Some(MediaSource::Path(path)) => record.path = Some(path),
            Some(MediaSource::Base64(b64)) => record.base64 = Some(b64),
            None => {}
        }
        record
    }
}

impl VoiceData {
    /// Creates voice data from a source.
    pub fn new(source: MediaSource) -> Self {
        Self {
            source: Some(source),
            length: None,
        }
    }

    /// Loads a local file and carries it inline as base64.
    pub async fn from_local(path: impl AsRef<Path>) -> MessageResult<Self> {
        let encoded = encode_file(path.as_ref()).await?;
        Ok(Self::new(MediaSource::Base64(encoded)))
    }

    /// Resolves the clip bytes and MIME type.
    pub async fn get_bytes(&self) -> MessageResult<(Vec<u8>, String)> {
        match &self.source {
            Some(source) => source.resolve(DEFAULT_VOICE_MIME).await,
            None => Err(MessageError::NoContentSource),
        }
    }
}
