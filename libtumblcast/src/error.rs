//! Error types for Tumblcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TumblcastError>;

#[derive(Error, Debug)]
pub enum TumblcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TumblcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TumblcastError::InvalidInput(_) => 3,
            TumblcastError::Auth(_) => 2,
            TumblcastError::Config(_) => 1,
            TumblcastError::Media(_) => 1,
            TumblcastError::Translate(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failures of the credential lifecycle
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    /// The user granted fewer scopes than the adapter needs to publish.
    #[error("Granted scopes '{granted}' do not cover the required scopes '{required}'. Suggestion: reconnect and approve all requested permissions.")]
    ScopeMismatch { granted: String, required: String },

    /// The refresh token is no longer valid; the user must authorize again.
    #[error("Refresh token rejected: {0}. Re-authentication required.")]
    RefreshRejected(String),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("Identity lookup failed: {0}")]
    Identity(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl AuthError {
    /// Whether the caller has to send the user through authorization again
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshRejected(_) | AuthError::ScopeMismatch { .. }
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum MediaError {
    #[error("Cannot read media file '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Unsupported media kind '{kind}' for '{path}'")]
    UnsupportedKind { kind: String, path: String },
}

/// Malformed internal input reaching the content translator
#[derive(Error, Debug, Clone)]
pub enum TranslateError {
    #[error("No post items supplied")]
    NoItems,

    #[error("No target blog selected")]
    MissingTarget,

    #[error("Failed to encode post content: {0}")]
    Encode(String),
}
