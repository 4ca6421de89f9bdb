//! Tumblcast - Tumblr publishing adapter
//!
//! This library lets a host publish to Tumblr without knowing its API:
//! OAuth2 credential handling, translation into the Neue Post Format,
//! multipart media attachment and classification of the platform's answer
//! into retry-friendly outcomes.

pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod platform;
pub mod publisher;
pub mod translate;
pub mod types;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, TumblrConfig};
pub use error::{AuthError, ConfigError, MediaError, Result, TranslateError, TumblcastError};
pub use platform::{MediaRules, SocialProvider, TumblrProvider};
pub use publisher::{PublishReport, PublishStage};
pub use types::{
    AuthorizationRequest, Credential, Identity, MediaKind, MediaRef, OutcomeKind,
    PlatformSettings, PostItem, PublishOutcome, Tag,
};
