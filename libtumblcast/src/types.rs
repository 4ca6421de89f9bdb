//! Core types for Tumblcast

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before `expires_at` at which a credential already counts as expired
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

/// OAuth2 bearer credential for one Tumblr user
///
/// Credentials are plain values: the adapter receives one per call and hands
/// back a new one after a refresh. The caller owns persistence.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    /// Platform user name
    pub subject_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl Credential {
    /// Whether the access token must be refreshed before use at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }
}

// Tokens never reach logs through Debug.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("display_name", &self.display_name)
            .field("avatar_url", &self.avatar_url)
            .finish()
    }
}

/// Authorization redirect handed to the user agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    /// Must be compared against the `state` echoed back on the redirect
    pub state: String,
    pub verifier: String,
}

/// Public identity of an authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub display_name: String,
    pub avatar_url: String,
    /// Every blog the user can post to, primary first
    pub available_targets: Vec<String>,
    pub primary_target: String,
}

/// Kind of a media attachment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Detect the kind from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => Some(Self::Image),
            "mp4" | "mov" | "webm" => Some(Self::Video),
            "mp3" | "wav" | "ogg" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Detect the kind from a path's extension
    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            _ => Err(format!(
                "Invalid media kind: '{}'. Valid options: image, video, audio",
                s
            )),
        }
    }
}

/// Reference to a local media artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRef {
    pub local_path: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl MediaRef {
    pub fn new(local_path: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            local_path: local_path.into(),
            kind,
            alt_text: None,
        }
    }

    pub fn with_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }
}

/// One entry of a platform-agnostic post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostItem {
    pub ordinal: u32,
    pub message: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

impl PostItem {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ordinal: 0,
            message: message.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media.push(media);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub label: String,
    pub value: String,
}

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Per-post Tumblr settings collected by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformSettings {
    /// Blog the post is published to
    pub target_blog: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default = "default_allow_reshare")]
    pub allow_reshare: bool,
}

fn default_allow_reshare() -> bool {
    true
}

impl PlatformSettings {
    pub fn new(target_blog: impl Into<String>) -> Self {
        Self {
            target_blog: target_blog.into(),
            tags: Vec::new(),
            allow_reshare: true,
        }
    }
}

/// Result of one publish call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Success {
        remote_post_id: String,
        /// Empty when the post could not be read back
        public_url: String,
    },
    RetryableFailure {
        reason: String,
    },
    TokenExpired {
        reason: String,
    },
    PermanentFailure {
        reason: String,
    },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            PublishOutcome::Success { .. } => OutcomeKind::Success,
            PublishOutcome::RetryableFailure { .. } => OutcomeKind::RetryableFailure,
            PublishOutcome::TokenExpired { .. } => OutcomeKind::TokenExpired,
            PublishOutcome::PermanentFailure { .. } => OutcomeKind::PermanentFailure,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PublishOutcome::Success { .. } => None,
            PublishOutcome::RetryableFailure { reason }
            | PublishOutcome::TokenExpired { reason }
            | PublishOutcome::PermanentFailure { reason } => Some(reason),
        }
    }

    pub(crate) fn permanent(reason: impl Into<String>) -> Self {
        PublishOutcome::PermanentFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn retryable(reason: impl Into<String>) -> Self {
        PublishOutcome::RetryableFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn token_expired(reason: impl Into<String>) -> Self {
        PublishOutcome::TokenExpired {
            reason: reason.into(),
        }
    }
}

/// Outcome variant without its payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    RetryableFailure,
    TokenExpired,
    PermanentFailure,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::RetryableFailure => write!(f, "retryable_failure"),
            OutcomeKind::TokenExpired => write!(f, "token_expired"),
            OutcomeKind::PermanentFailure => write!(f, "permanent_failure"),
        }
    }
}
