//! OAuth2 credential lifecycle for Tumblr
//!
//! Covers the authorization redirect, code exchange, token refresh and the
//! identity lookups that go with them. Credentials are values: every
//! operation returns a new [`Credential`] and nothing is cached here.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::TumblrConfig;
use crate::error::{AuthError, ConfigError, Result};
use crate::http::{HttpClient, RawResponse};
use crate::types::{AuthorizationRequest, Credential, Identity};

/// Scopes the adapter needs to read identity and publish
pub const REQUIRED_SCOPES: &[&str] = &["basic", "write"];

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 2520;

/// Avatar edge length requested for the identity picture
const AVATAR_SIZE: &str = "64";

/// OAuth error codes meaning the refresh token itself is dead
const REJECTED_GRANT_ERRORS: &[&str] = &["invalid_grant", "invalid_token", "unauthorized_client"];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoEnvelope {
    response: UserInfoResponse,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: String,
    #[serde(default)]
    blogs: Vec<BlogInfo>,
}

#[derive(Debug, Deserialize)]
struct BlogInfo {
    name: String,
    #[serde(default)]
    primary: bool,
}

/// URL-safe random token of 32 bytes
fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 code challenge for a verifier (RFC 7636)
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Check the granted scopes against [`REQUIRED_SCOPES`]
///
/// An absent scope means the requested scope was granted (RFC 6749 §5.1).
fn check_scopes(granted: Option<&str>) -> std::result::Result<(), AuthError> {
    let Some(granted) = granted else {
        return Ok(());
    };

    let granted_set: Vec<&str> = granted
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();

    if REQUIRED_SCOPES.iter().all(|s| granted_set.contains(s)) {
        Ok(())
    } else {
        Err(AuthError::ScopeMismatch {
            granted: granted.to_string(),
            required: REQUIRED_SCOPES.join(" "),
        })
    }
}

/// Put the primary blog first, then every other blog once, in platform order
fn order_targets(blogs: &[BlogInfo], primary: &str) -> Vec<String> {
    let mut targets = vec![primary.to_string()];
    for blog in blogs {
        if !targets.contains(&blog.name) {
            targets.push(blog.name.clone());
        }
    }
    targets
}

fn network_error(context: &str, e: reqwest::Error) -> AuthError {
    AuthError::Network(format!("Tumblr {} request failed: {}", context, e))
}

/// Obtains and refreshes Tumblr bearer credentials
#[derive(Debug, Clone)]
pub struct CredentialLifecycle {
    config: Arc<TumblrConfig>,
    http: HttpClient,
}

impl CredentialLifecycle {
    pub fn new(config: Arc<TumblrConfig>, http: HttpClient) -> Self {
        Self { config, http }
    }

    /// Build the authorization redirect with a fresh state and verifier
    ///
    /// No network call is made. The caller stores `state` and `verifier`
    /// until the user comes back with a code.
    pub fn generate_authorization_request(&self) -> Result<AuthorizationRequest> {
        let state = random_token();
        let verifier = random_token();
        let redirect_uri = self.config.redirect_uri()?;
        let scope = REQUIRED_SCOPES.join(" ");
        let challenge = code_challenge(&verifier);

        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("state", state.as_str()),
                ("scope", scope.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "tumblr.authorize_url".to_string(),
            reason: e.to_string(),
        })?;

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            state,
            verifier,
        })
    }

    /// Exchange an authorization code for a credential
    ///
    /// # Errors
    ///
    /// - `AuthError::ScopeMismatch` if the user granted less than `basic write`
    /// - `AuthError::TokenEndpoint` / `AuthError::Network` if the exchange fails
    /// - `AuthError::Identity` if the new token cannot read the user's identity
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Credential> {
        let redirect_uri = self.config.redirect_uri()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        let response = self.request_token("code exchange", &form).await?;
        if !response.is_success() {
            return Err(token_failure(&response, false).into());
        }

        let token: TokenResponse = response.json().map_err(|e| AuthError::TokenEndpoint {
            status: response.status,
            body: format!("unparseable token response ({}): {}", e, response.body),
        })?;

        check_scopes(token.scope.as_deref())?;

        let identity = self.fetch_identity(&token.access_token).await?;
        info!("Authorized Tumblr user {}", identity.display_name);

        let refresh_token = token.refresh_token.unwrap_or_default();
        if refresh_token.is_empty() {
            warn!("Tumblr issued no refresh token; the credential cannot be refreshed");
        }

        Ok(Credential {
            subject_id: identity.display_name.clone(),
            access_token: token.access_token,
            refresh_token,
            expires_at: expiry_from(token.expires_in),
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
        })
    }

    /// Trade the refresh token for a new access token
    ///
    /// The identity fields are carried over from `current`; a response
    /// without a new refresh token keeps the old one.
    ///
    /// # Errors
    ///
    /// `AuthError::RefreshRejected` when the platform reports the refresh
    /// token invalid. The user has to authorize again; retrying is pointless.
    pub async fn refresh(&self, current: &Credential) -> Result<Credential> {
        if current.refresh_token.is_empty() {
            return Err(AuthError::RefreshRejected("no refresh token stored".to_string()).into());
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret()),
        ];

        let response = self.request_token("token refresh", &form).await?;
        if !response.is_success() {
            return Err(token_failure(&response, true).into());
        }

        let token: TokenResponse = response.json().map_err(|e| AuthError::TokenEndpoint {
            status: response.status,
            body: format!("unparseable token response ({}): {}", e, response.body),
        })?;

        debug!("Refreshed Tumblr credential for {}", current.subject_id);

        Ok(Credential {
            subject_id: current.subject_id.clone(),
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: expiry_from(token.expires_in),
            display_name: current.display_name.clone(),
            avatar_url: current.avatar_url.clone(),
        })
    }

    /// Look up the user's name, avatar and blogs
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity> {
        let url = self.http.endpoint(&["v2", "user", "info"]);
        let response = self
            .http
            .execute("user info", self.http.get(url).bearer_auth(access_token))
            .await
            .map_err(|e| network_error("user info", e))?;

        if !response.is_success() {
            return Err(AuthError::Identity(format!(
                "user info returned HTTP {}: {}",
                response.status, response.body
            ))
            .into());
        }

        let envelope: UserInfoEnvelope = response.json().map_err(|e| {
            AuthError::Identity(format!("unparseable user info ({}): {}", e, response.body))
        })?;
        let user = envelope.response.user;

        let primary = user
            .blogs
            .iter()
            .find(|b| b.primary)
            .or_else(|| user.blogs.first())
            .map(|b| b.name.clone())
            .ok_or_else(|| AuthError::Identity(format!("user {} has no blogs", user.name)))?;

        let avatar_url = self.fetch_avatar_url(access_token, &primary).await;

        Ok(Identity {
            display_name: user.name,
            avatar_url,
            available_targets: order_targets(&user.blogs, &primary),
            primary_target: primary,
        })
    }

    /// Blogs the user can publish to, primary blog first
    pub async fn list_available_targets(&self, access_token: &str) -> Result<Vec<String>> {
        Ok(self.fetch_identity(access_token).await?.available_targets)
    }

    // The avatar endpoint redirects to the image; its final URL is the picture.
    async fn fetch_avatar_url(&self, access_token: &str, blog: &str) -> String {
        let url = self.http.endpoint(&["v2", "blog", blog, "avatar", AVATAR_SIZE]);
        match self
            .http
            .locate("blog avatar", self.http.get(url).bearer_auth(access_token))
            .await
        {
            Ok(response) if response.is_success() => response.url,
            Ok(response) => {
                warn!("Avatar lookup for {} returned HTTP {}", blog, response.status);
                String::new()
            }
            Err(e) => {
                warn!("Avatar lookup for {} failed: {}", blog, e);
                String::new()
            }
        }
    }

    async fn request_token(
        &self,
        context: &str,
        form: &[(&str, &str)],
    ) -> std::result::Result<RawResponse, AuthError> {
        let url = self.http.endpoint(&["v2", "oauth2", "token"]);
        self.http
            .execute(context, self.http.post(url).form(form))
            .await
            .map_err(|e| network_error(context, e))
    }
}

// Lifetimes that overflow a timestamp fall back to the default.
fn expiry_from(expires_in: Option<i64>) -> chrono::DateTime<Utc> {
    let now = Utc::now();
    let lifetime = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Duration::try_seconds(lifetime)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or_else(|| {
            warn!("Token lifetime of {}s is out of range, using default", lifetime);
            now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)
        })
}

fn token_failure(response: &RawResponse, refreshing: bool) -> AuthError {
    let oauth = response.json::<OAuthErrorBody>().ok();

    if refreshing {
        let rejected = match &oauth {
            Some(body) => REJECTED_GRANT_ERRORS.contains(&body.error.as_str()),
            None => response.status == 401,
        };
        if rejected {
            let reason = oauth
                .map(|b| match b.error_description {
                    Some(description) => format!("{}: {}", b.error, description),
                    None => b.error,
                })
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            return AuthError::RefreshRejected(reason);
        }
    }

    AuthError::TokenEndpoint {
        status: response.status,
        body: response.body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blogs(names: &[(&str, bool)]) -> Vec<BlogInfo> {
        names
            .iter()
            .map(|(name, primary)| BlogInfo {
                name: name.to_string(),
                primary: *primary,
            })
            .collect()
    }

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            url: "https://api.tumblr.com/v2/oauth2/token".into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_random_token_is_unguessable_shape() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_code_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_expiry_from_out_of_range_lifetime() {
        let before = Utc::now();
        for lifetime in [i64::MAX, i64::MIN, i64::MAX / 1000] {
            let expiry = expiry_from(Some(lifetime));
            assert!(expiry >= before + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
            assert!(expiry <= Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        }

        let expiry = expiry_from(Some(60));
        assert!(expiry <= Utc::now() + Duration::seconds(60));
    }

    #[test]
    fn test_check_scopes() {
        assert!(check_scopes(None).is_ok());
        assert!(check_scopes(Some("basic write")).is_ok());
        assert!(check_scopes(Some("write offline_access basic")).is_ok());
        assert!(check_scopes(Some("basic,write")).is_ok());

        match check_scopes(Some("basic")) {
            Err(AuthError::ScopeMismatch { granted, required }) => {
                assert_eq!(granted, "basic");
                assert_eq!(required, "basic write");
            }
            other => panic!("Expected scope mismatch, got {:?}", other),
        }
        assert!(check_scopes(Some("")).is_err());
    }

    #[test]
    fn test_order_targets_primary_first() {
        let list = blogs(&[("side", false), ("main", true), ("art", false)]);
        assert_eq!(order_targets(&list, "main"), vec!["main", "side", "art"]);
    }

    #[test]
    fn test_order_targets_dedupes() {
        let list = blogs(&[("main", true), ("main", false), ("x", false)]);
        assert_eq!(order_targets(&list, "main"), vec!["main", "x"]);
    }

    #[test]
    fn test_token_failure_refresh_rejected() {
        let response = raw(
            400,
            r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#,
        );
        match token_failure(&response, true) {
            AuthError::RefreshRejected(reason) => {
                assert_eq!(reason, "invalid_grant: Refresh token revoked")
            }
            other => panic!("Expected refresh rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_token_failure_bare_401_during_refresh() {
        assert!(matches!(
            token_failure(&raw(401, "Unauthorized"), true),
            AuthError::RefreshRejected(_)
        ));
    }

    #[test]
    fn test_token_failure_server_error_is_not_rejection() {
        match token_failure(&raw(503, "<html>down</html>"), true) {
            AuthError::TokenEndpoint { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("down"));
            }
            other => panic!("Expected token endpoint error, got {:?}", other),
        }
    }

    #[test]
    fn test_token_failure_during_exchange_is_not_rejection() {
        assert!(matches!(
            token_failure(&raw(400, r#"{"error":"invalid_grant"}"#), false),
            AuthError::TokenEndpoint { status: 400, .. }
        ));
    }

    #[test]
    fn test_token_failure_invalid_client_is_configuration_problem() {
        assert!(matches!(
            token_failure(&raw(401, r#"{"error":"invalid_client"}"#), true),
            AuthError::TokenEndpoint { status: 401, .. }
        ));
    }
}
