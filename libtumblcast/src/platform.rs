//! Provider capability interface and the Tumblr provider
//!
//! A host talks to a social platform only through [`SocialProvider`]:
//! authorization, credential maintenance, identity lookups and publishing.
//! [`TumblrProvider`] wires the Tumblr pieces together behind it.
//!
//! # Examples
//!
//! ```no_run
//! use libtumblcast::config::TumblrConfig;
//! use libtumblcast::platform::{SocialProvider, TumblrProvider};
//! use libtumblcast::types::{PlatformSettings, PostItem};
//!
//! # async fn example(credential: libtumblcast::Credential) -> libtumblcast::Result<()> {
//! let config = TumblrConfig::new("client-id", "client-secret", "https://app.example/cb");
//! let provider = TumblrProvider::new(config)?;
//!
//! let report = provider
//!     .publish(&credential, &[PostItem::new("Hello, Tumblr")], &PlatformSettings::new("staff"))
//!     .await;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{CredentialLifecycle, REQUIRED_SCOPES};
use crate::classify;
use crate::config::TumblrConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::publisher::{PublishReport, Publisher};
use crate::translate::{
    MAX_MEDIA_PER_POST, MAX_TAGS, MAX_TAG_LENGTH, MAX_VIDEOS_PER_POST, MAX_VIDEO_DURATION_SECS,
    MAX_VIDEO_SIZE_BYTES,
};
use crate::types::{
    AuthorizationRequest, Credential, Identity, PlatformSettings, PostItem, PublishOutcome,
};

/// Tumblr has no practical text limit; this is the advertised ceiling
pub const TEXT_LIMIT: usize = 999_999;

/// Per-post limits a provider advertises to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRules {
    pub max_media: usize,
    pub max_videos: usize,
    pub max_video_duration_secs: u64,
    pub max_video_size_bytes: u64,
    pub max_tags: usize,
    pub max_tag_length: usize,
    pub text_limit: usize,
}

/// Capability interface every social provider implements
#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// Stable lowercase identifier (e.g. "tumblr")
    fn identifier(&self) -> &str;

    /// Human-readable platform name
    fn name(&self) -> &str;

    fn required_scopes(&self) -> &[&str];

    /// Start an authorization: URL to send the user to, plus state and verifier
    fn authorization_request(&self) -> Result<AuthorizationRequest>;

    /// Finish an authorization by exchanging the returned code
    async fn authenticate(&self, code: &str, verifier: &str) -> Result<Credential>;

    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity>;

    /// Publish targets available to the user, primary first
    async fn list_targets(&self, access_token: &str) -> Result<Vec<String>>;

    /// Run one publish attempt. Never fails: errors are outcomes.
    async fn publish(
        &self,
        credential: &Credential,
        items: &[PostItem],
        settings: &PlatformSettings,
    ) -> PublishReport;

    /// Map a raw platform response to an outcome
    fn classify_response(&self, status: u16, body: &str) -> PublishOutcome;

    fn media_rules(&self) -> MediaRules;
}

/// Tumblr implementation of [`SocialProvider`]
#[derive(Debug, Clone)]
pub struct TumblrProvider {
    config: Arc<TumblrConfig>,
    auth: CredentialLifecycle,
    publisher: Publisher,
}

impl TumblrProvider {
    /// Build a provider from validated configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is incomplete or the API
    /// base URL is unusable.
    pub fn new(config: TumblrConfig) -> Result<Self> {
        config.validate()?;

        let http = HttpClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let config = Arc::new(config);
        let auth = CredentialLifecycle::new(Arc::clone(&config), http.clone());
        let publisher = Publisher::new(http, auth.clone());

        Ok(Self {
            config,
            auth,
            publisher,
        })
    }

    pub fn config(&self) -> &TumblrConfig {
        &self.config
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}

#[async_trait]
impl SocialProvider for TumblrProvider {
    fn identifier(&self) -> &str {
        "tumblr"
    }

    fn name(&self) -> &str {
        "Tumblr"
    }

    fn required_scopes(&self) -> &[&str] {
        REQUIRED_SCOPES
    }

    fn authorization_request(&self) -> Result<AuthorizationRequest> {
        self.auth.generate_authorization_request()
    }

    async fn authenticate(&self, code: &str, verifier: &str) -> Result<Credential> {
        self.auth.exchange_code(code, verifier).await
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        self.auth.refresh(credential).await
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity> {
        self.auth.fetch_identity(access_token).await
    }

    async fn list_targets(&self, access_token: &str) -> Result<Vec<String>> {
        self.auth.list_available_targets(access_token).await
    }

    async fn publish(
        &self,
        credential: &Credential,
        items: &[PostItem],
        settings: &PlatformSettings,
    ) -> PublishReport {
        self.publisher
            .publish_report(credential, items, settings)
            .await
    }

    fn classify_response(&self, status: u16, body: &str) -> PublishOutcome {
        classify::classify_response(status, body)
    }

    fn media_rules(&self) -> MediaRules {
        MediaRules {
            max_media: MAX_MEDIA_PER_POST,
            max_videos: MAX_VIDEOS_PER_POST,
            max_video_duration_secs: MAX_VIDEO_DURATION_SECS,
            max_video_size_bytes: MAX_VIDEO_SIZE_BYTES,
            max_tags: MAX_TAGS,
            max_tag_length: MAX_TAG_LENGTH,
            text_limit: TEXT_LIMIT,
        }
    }
}
