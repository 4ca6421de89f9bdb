//! Publish orchestration
//!
//! Runs one publish attempt end to end: translate the post, load its media,
//! make sure the credential is fresh, send the creation request and reduce
//! the answer to a [`PublishOutcome`]. Every failure becomes an outcome; the
//! caller decides whether and when to try again.

use std::fmt;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::CredentialLifecycle;
use crate::classify::{classify_response, extract_post_id, Envelope};
use crate::error::TumblcastError;
use crate::http::HttpClient;
use crate::translate::translate;
use crate::types::{Credential, PlatformSettings, PostItem, PublishOutcome};
use crate::upload::MediaBundle;

/// Where a publish attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Authorizing,
    Translating,
    Uploading,
    AwaitingResponse,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStage::Authorizing => write!(f, "authorizing"),
            PublishStage::Translating => write!(f, "translating"),
            PublishStage::Uploading => write!(f, "uploading"),
            PublishStage::AwaitingResponse => write!(f, "awaiting_response"),
        }
    }
}

/// Outcome of a publish attempt plus anything the caller must persist
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub outcome: PublishOutcome,
    /// Replacement credential when the attempt had to refresh
    pub refreshed: Option<Credential>,
    /// Last stage the attempt reached
    pub stage: PublishStage,
}

/// Drives single publish attempts against one Tumblr API
#[derive(Debug, Clone)]
pub struct Publisher {
    http: HttpClient,
    auth: CredentialLifecycle,
}

/// Tracks the stage of one attempt and logs each transition
struct Attempt {
    stage: PublishStage,
    refreshed: Option<Credential>,
}

impl Attempt {
    fn enter(&mut self, stage: PublishStage) {
        debug!("Publish stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn finish(self, outcome: PublishOutcome) -> PublishReport {
        PublishReport {
            outcome,
            refreshed: self.refreshed,
            stage: self.stage,
        }
    }
}

impl Publisher {
    pub fn new(http: HttpClient, auth: CredentialLifecycle) -> Self {
        Self { http, auth }
    }

    /// Publish the first item to the blog named in `settings`
    pub async fn publish(
        &self,
        credential: &Credential,
        items: &[PostItem],
        settings: &PlatformSettings,
    ) -> PublishOutcome {
        self.publish_report(credential, items, settings)
            .await
            .outcome
    }

    /// Like [`Publisher::publish`], also returning a refreshed credential
    ///
    /// When `refreshed` is set the old credential is spent: store the new one
    /// whatever the outcome.
    pub async fn publish_report(
        &self,
        credential: &Credential,
        items: &[PostItem],
        settings: &PlatformSettings,
    ) -> PublishReport {
        let span = info_span!(
            "publish",
            attempt = %Uuid::new_v4(),
            blog = %settings.target_blog
        );
        self.run(credential, items, settings).instrument(span).await
    }

    async fn run(
        &self,
        credential: &Credential,
        items: &[PostItem],
        settings: &PlatformSettings,
    ) -> PublishReport {
        // A post that fails local checks never reaches the network, not even
        // the token endpoint.
        let mut attempt = Attempt {
            stage: PublishStage::Translating,
            refreshed: None,
        };

        let translated = match translate(items, settings) {
            Ok(translated) => translated,
            Err(e) => return attempt.finish(PublishOutcome::permanent(e.to_string())),
        };

        attempt.enter(PublishStage::Uploading);
        let bundle = match MediaBundle::load(&translated.item.media).await {
            Ok(bundle) => bundle,
            Err(e) => return attempt.finish(PublishOutcome::permanent(e.to_string())),
        };

        attempt.enter(PublishStage::Authorizing);
        if credential.is_expired(Utc::now()) {
            debug!("Credential for {} is expired, refreshing", credential.subject_id);
            match self.auth.refresh(credential).await {
                Ok(fresh) => attempt.refreshed = Some(fresh),
                Err(TumblcastError::Auth(e)) if e.requires_reauthentication() => {
                    warn!("Refresh rejected: {}", e);
                    return attempt.finish(PublishOutcome::token_expired(e.to_string()));
                }
                Err(e) => {
                    warn!("Refresh failed: {}", e);
                    return attempt.finish(PublishOutcome::retryable(format!(
                        "credential refresh failed: {}",
                        e
                    )));
                }
            }
        }
        let access_token = attempt
            .refreshed
            .as_ref()
            .unwrap_or(credential)
            .access_token
            .clone();

        attempt.enter(PublishStage::Uploading);
        debug!(
            "Attaching {} media part(s), {} bytes",
            bundle.len(),
            bundle.total_bytes()
        );
        let form = match bundle.into_form(&translated.post) {
            Ok(form) => form,
            Err(e) => return attempt.finish(PublishOutcome::permanent(e.to_string())),
        };

        attempt.enter(PublishStage::AwaitingResponse);
        let blog = translated.target_blog;
        let url = self.http.endpoint(&["v2", "blog", blog, "posts"]);
        let request = self.http.post(url).bearer_auth(&access_token).multipart(form);

        let response = match self.http.execute("create post", request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Post creation request failed: {}", e);
                return attempt.finish(PublishOutcome::retryable(format!(
                    "network failure creating post: {}",
                    e
                )));
            }
        };

        let outcome = match classify_response(response.status, &response.body) {
            PublishOutcome::Success { remote_post_id, .. } => {
                let public_url = self
                    .resolve_public_url(&access_token, blog, &remote_post_id)
                    .await;
                info!("Published post {} to {}", remote_post_id, blog);
                PublishOutcome::Success {
                    remote_post_id,
                    public_url,
                }
            }
            other => {
                warn!("Publish to {} ended as {}", blog, other.kind());
                other
            }
        };

        attempt.finish(outcome)
    }

    /// Read the created post back to learn its public URL
    ///
    /// Returns an empty string on any failure: the post exists either way.
    pub async fn resolve_public_url(&self, access_token: &str, blog: &str, post_id: &str) -> String {
        let url = self.http.endpoint(&["v2", "blog", blog, "posts", post_id]);
        let response = match self
            .http
            .execute("read post", self.http.get(url).bearer_auth(access_token))
            .await
        {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!("Post lookup for {} returned HTTP {}", post_id, response.status);
                return String::new();
            }
            Err(e) => {
                warn!("Post lookup for {} failed: {}", post_id, e);
                return String::new();
            }
        };

        match response.json::<Envelope>() {
            Ok(envelope) => public_url_from(&envelope.response, post_id).unwrap_or_else(|| {
                warn!("Post lookup for {} carried no post_url", post_id);
                String::new()
            }),
            Err(e) => {
                warn!("Unparseable post lookup for {}: {}", post_id, e);
                String::new()
            }
        }
    }
}

fn public_url_from(response: &Value, post_id: &str) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(String::from);

    if let Some(url) = response.get("post_url").and_then(non_empty) {
        return Some(url);
    }

    response
        .get("posts")?
        .as_array()?
        .iter()
        .find(|post| extract_post_id(post).as_deref() == Some(post_id))
        .and_then(|post| post.get("post_url"))
        .and_then(non_empty)
}
