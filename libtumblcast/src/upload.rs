//! Media attachment for the post creation request
//!
//! Every media item travels in the same multipart request as the JSON
//! content. The part name and file name are the item's local path, which is
//! also the identifier the content blocks point at.

use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::error::{MediaError, Result};
use crate::translate::{NpfPost, MAX_VIDEO_SIZE_BYTES};
use crate::types::{MediaKind, MediaRef};

/// Binary part for one media item
#[derive(Clone)]
pub struct MediaPart {
    /// Multipart field name, equal to the content block identifier
    pub name: String,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPart")
            .field("name", &self.name)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// All media of one post, loaded into memory
#[derive(Debug, Clone, Default)]
pub struct MediaBundle {
    parts: Vec<MediaPart>,
}

/// Guess a MIME type from the file extension
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

impl MediaBundle {
    /// Read every referenced file, in order
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Unreadable` for the first file that cannot be read.
    pub async fn load(media: &[MediaRef]) -> Result<Self> {
        let mut parts = Vec::with_capacity(media.len());

        for item in media {
            let bytes = tokio::fs::read(&item.local_path).await.map_err(|e| {
                MediaError::Unreadable {
                    path: item.local_path.clone(),
                    reason: e.to_string(),
                }
            })?;

            if item.kind == MediaKind::Video && bytes.len() as u64 > MAX_VIDEO_SIZE_BYTES {
                warn!(
                    "Video '{}' is {} bytes, above Tumblr's {} byte limit",
                    item.local_path,
                    bytes.len(),
                    MAX_VIDEO_SIZE_BYTES
                );
            }

            debug!("Loaded media '{}' ({} bytes)", item.local_path, bytes.len());

            parts.push(MediaPart {
                name: item.local_path.clone(),
                file_name: item.local_path.clone(),
                mime_type: mime_for_path(&item.local_path),
                bytes,
            });
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[MediaPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.bytes.len()).sum()
    }

    /// Field names and text values of the non-binary parts, in send order
    pub fn text_fields(post: &NpfPost) -> Result<Vec<(&'static str, String)>> {
        let mut fields = vec![("content", post.content_json()?)];
        if let Some(tags) = &post.tags {
            fields.push(("tags", tags.clone()));
        }
        fields.push((
            "interactability_reblog",
            post.interactability_reblog.as_str().to_string(),
        ));
        Ok(fields)
    }

    /// Build the multipart body for the post creation call
    pub fn into_form(self, post: &NpfPost) -> Result<Form> {
        // Part names must match the content identifiers byte for byte.
        let mut form = Form::new().percent_encode_noop();

        for (name, value) in Self::text_fields(post)? {
            let part = if name == "content" {
                Part::text(value)
                    .mime_str("application/json")
                    .map_err(|e| crate::error::TranslateError::Encode(e.to_string()))?
            } else {
                Part::text(value)
            };
            form = form.part(name, part);
        }

        for media in self.parts {
            let part = Part::bytes(media.bytes)
                .file_name(media.file_name)
                .mime_str(media.mime_type)
                .map_err(|e| MediaError::Unreadable {
                    path: media.name.clone(),
                    reason: e.to_string(),
                })?;
            form = form.part(media.name, part);
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{ContentBlock, ReblogAudience};
    use std::fs;
    use tempfile::TempDir;

    fn post(tags: Option<&str>) -> NpfPost {
        NpfPost {
            content: vec![ContentBlock::Text { text: "hi".into() }],
            tags: tags.map(String::from),
            interactability_reblog: ReblogAudience::Noone,
        }
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path("/a/b.PNG"), "image/png");
        assert_eq!(mime_for_path("clip.mov"), "video/quicktime");
        assert_eq!(mime_for_path("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_load_preserves_order_and_names() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.png");
        let second = dir.path().join("two.mp4");
        fs::write(&first, b"png-bytes").unwrap();
        fs::write(&second, b"video-bytes!").unwrap();

        let media = vec![
            MediaRef::new(first.to_string_lossy(), MediaKind::Image),
            MediaRef::new(second.to_string_lossy(), MediaKind::Video),
        ];
        let bundle = MediaBundle::load(&media).await.unwrap();

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.total_bytes(), 9 + 12);
        let parts = bundle.parts();
        assert_eq!(parts[0].name, first.to_string_lossy());
        assert_eq!(parts[0].file_name, parts[0].name);
        assert_eq!(parts[0].mime_type, "image/png");
        assert_eq!(parts[0].bytes, b"png-bytes");
        assert_eq!(parts[1].mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_unreadable() {
        let media = vec![MediaRef::new("/definitely/not/here.png", MediaKind::Image)];
        match MediaBundle::load(&media).await {
            Err(crate::TumblcastError::Media(MediaError::Unreadable { path, .. })) => {
                assert_eq!(path, "/definitely/not/here.png");
            }
            other => panic!("Expected unreadable media, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_empty() {
        let bundle = MediaBundle::load(&[]).await.unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_text_fields_without_tags() {
        let fields = MediaBundle::text_fields(&post(None)).unwrap();
        let names: Vec<_> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["content", "interactability_reblog"]);
        assert_eq!(fields[1].1, "noone");
    }

    #[test]
    fn test_text_fields_with_tags() {
        let fields = MediaBundle::text_fields(&post(Some("a,b"))).unwrap();
        assert_eq!(fields[1], ("tags", "a,b".to_string()));
        assert_eq!(fields[0].1, r#"[{"type":"text","text":"hi"}]"#);
    }

    #[test]
    fn test_into_form_builds() {
        let bundle = MediaBundle {
            parts: vec![MediaPart {
                name: "/m/a.png".into(),
                file_name: "/m/a.png".into(),
                mime_type: "image/png",
                bytes: vec![1, 2, 3],
            }],
        };
        let form = bundle.into_form(&post(Some("x"))).unwrap();
        assert!(!form.boundary().is_empty());
    }
}
