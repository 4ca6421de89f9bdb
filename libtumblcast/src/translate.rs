//! Translation of platform-agnostic posts into Tumblr's Neue Post Format
//!
//! Pure and deterministic: no I/O happens here. Media bytes are attached
//! later by [`crate::upload`], keyed by the identifiers chosen below.

use serde::Serialize;
use tracing::warn;

use crate::error::{MediaError, Result, TranslateError};
use crate::types::{MediaKind, PlatformSettings, PostItem};

pub const MAX_MEDIA_PER_POST: usize = 30;
pub const MAX_VIDEOS_PER_POST: usize = 1;
pub const MAX_VIDEO_DURATION_SECS: u64 = 600;
pub const MAX_VIDEO_SIZE_BYTES: u64 = 500 * 1024 * 1024;
pub const MAX_TAGS: usize = 30;
pub const MAX_TAG_LENGTH: usize = 140;

/// Reference from a content block to a multipart part
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaIdentifier {
    pub identifier: String,
}

/// One block of an NPF post
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Image {
        media: Vec<MediaIdentifier>,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt_text: Option<String>,
    },
    Video {
        media: Vec<MediaIdentifier>,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt_text: Option<String>,
    },
    Text {
        text: String,
    },
}

impl ContentBlock {
    fn media(kind: MediaKind, identifier: &str, alt_text: Option<String>) -> Option<Self> {
        let media = vec![MediaIdentifier {
            identifier: identifier.to_string(),
        }];
        match kind {
            MediaKind::Image => Some(ContentBlock::Image { media, alt_text }),
            MediaKind::Video => Some(ContentBlock::Video { media, alt_text }),
            MediaKind::Audio => None,
        }
    }
}

/// Who may reblog the post
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReblogAudience {
    Everyone,
    Noone,
}

impl ReblogAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReblogAudience::Everyone => "everyone",
            ReblogAudience::Noone => "noone",
        }
    }
}

impl From<bool> for ReblogAudience {
    fn from(allow_reshare: bool) -> Self {
        if allow_reshare {
            ReblogAudience::Everyone
        } else {
            ReblogAudience::Noone
        }
    }
}

/// Outbound post payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NpfPost {
    pub content: Vec<ContentBlock>,
    /// Comma-joined tag values; absent rather than empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub interactability_reblog: ReblogAudience,
}

impl NpfPost {
    /// JSON text of the content blocks, as sent in the `content` part
    pub fn content_json(&self) -> Result<String> {
        serde_json::to_string(&self.content)
            .map_err(|e| TranslateError::Encode(e.to_string()).into())
    }
}

/// A translated post together with the item it came from
#[derive(Debug, Clone)]
pub struct Translated<'a> {
    pub post: NpfPost,
    pub target_blog: &'a str,
    pub item: &'a PostItem,
}

/// Translate the first post item plus settings into an NPF payload
///
/// Tumblr posts are single posts, not threads: items after the first are
/// ignored.
///
/// # Errors
///
/// - `TranslateError::NoItems` / `TranslateError::MissingTarget` for
///   malformed input
/// - `MediaError::UnsupportedKind` for media Tumblr cannot carry
pub fn translate<'a>(
    items: &'a [PostItem],
    settings: &'a PlatformSettings,
) -> Result<Translated<'a>> {
    let item = items.first().ok_or(TranslateError::NoItems)?;

    if settings.target_blog.trim().is_empty() {
        return Err(TranslateError::MissingTarget.into());
    }

    if items.len() > 1 {
        warn!(
            "Tumblr publishes single posts; ignoring {} additional item(s)",
            items.len() - 1
        );
    }

    check_limits(item, settings);

    let mut content = Vec::with_capacity(item.media.len() + 1);
    for media in &item.media {
        let block = ContentBlock::media(media.kind, &media.local_path, media.alt_text.clone())
            .ok_or_else(|| MediaError::UnsupportedKind {
                kind: media.kind.to_string(),
                path: media.local_path.clone(),
            })?;
        content.push(block);
    }

    if !item.message.is_empty() {
        content.push(ContentBlock::Text {
            text: item.message.clone(),
        });
    }

    Ok(Translated {
        post: NpfPost {
            content,
            tags: join_tags(settings),
            interactability_reblog: settings.allow_reshare.into(),
        },
        target_blog: &settings.target_blog,
        item,
    })
}

fn join_tags(settings: &PlatformSettings) -> Option<String> {
    let joined = settings
        .tags
        .iter()
        .map(|t| t.value.as_str())
        .collect::<Vec<_>>()
        .join(",");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

// Limits are enforced upstream; anything that slips through is logged and
// left for the platform to judge.
fn check_limits(item: &PostItem, settings: &PlatformSettings) {
    if item.media.len() > MAX_MEDIA_PER_POST {
        warn!(
            "Post carries {} media items, Tumblr accepts at most {}",
            item.media.len(),
            MAX_MEDIA_PER_POST
        );
    }

    let videos = item
        .media
        .iter()
        .filter(|m| m.kind == MediaKind::Video)
        .count();
    if videos > MAX_VIDEOS_PER_POST {
        warn!(
            "Post carries {} videos, Tumblr accepts at most {}",
            videos, MAX_VIDEOS_PER_POST
        );
    }

    if settings.tags.len() > MAX_TAGS {
        warn!(
            "Post carries {} tags, Tumblr accepts at most {}",
            settings.tags.len(),
            MAX_TAGS
        );
    }

    for tag in &settings.tags {
        if tag.value.chars().count() > MAX_TAG_LENGTH || tag.value.contains(['#', ',']) {
            warn!("Tag '{}' violates Tumblr tag rules", tag.value);
        }
    }
}
