//! tumbl-post - Publish to Tumblr from the command line

mod store;

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use libtumblcast::logging::LoggingConfig;
use libtumblcast::{
    Config, Credential, MediaKind, MediaRef, OutcomeKind, PlatformSettings, PostItem,
    PublishOutcome, SocialProvider, Tag, TumblcastError, TumblrProvider,
};
use tracing::info;

/// Token expired and could not be refreshed: re-authorize
const EXIT_TOKEN_EXPIRED: i32 = 2;
/// Temporary failure, try again later (EX_TEMPFAIL)
const EXIT_RETRYABLE: i32 = 75;
const EXIT_PERMANENT: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "tumbl-post")]
#[command(version)]
#[command(about = "Publish to Tumblr from the command line")]
#[command(long_about = "\
tumbl-post - Publish to Tumblr from the command line

USAGE:
    # Authorize once
    tumbl-post auth-url
    tumbl-post exchange --code <CODE> --verifier <VERIFIER>

    # Publish
    tumbl-post post \"Hello Tumblr\" --blog staff --tag rust
    echo \"From stdin\" | tumbl-post post
    tumbl-post post \"Look\" --media cat.jpg=\"A sleeping cat\"

CONFIGURATION:
    Configuration file: ~/.config/tumblcast/config.toml (or $TUMBLCAST_CONFIG)

    [tumblr]
    client_id = \"...\"
    client_secret = \"...\"
    redirect_uri = \"https://example.com/integrations/social/tumblr\"

    TUMBLR_CLIENT_ID, TUMBLR_CLIENT_SECRET and FRONTEND_URL override the file.

EXIT CODES:
    0  - Success
    1  - Permanent failure
    2  - Authorization required (token expired or rejected)
    3  - Invalid input
    75 - Temporary failure, retry later
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Credential file (default: <data dir>/tumblcast/credential.json)
    #[arg(long, global = true, value_name = "FILE", env = "TUMBLCAST_CREDENTIAL")]
    credential: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an authorization URL with its state and verifier
    AuthUrl,

    /// Exchange an authorization code and store the credential
    Exchange {
        /// Code from the authorization redirect
        #[arg(long)]
        code: String,

        /// Verifier printed by auth-url
        #[arg(long)]
        verifier: String,
    },

    /// Refresh the stored credential
    Refresh,

    /// Show the authorized user
    Identity,

    /// List blogs the user can post to, primary first
    Blogs,

    /// Publish a post
    Post {
        /// Post text (reads from stdin if not provided)
        message: Option<String>,

        /// Target blog (default: primary blog)
        #[arg(short, long)]
        blog: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Media file to attach, optionally with alt text (repeatable)
        #[arg(short, long = "media", value_name = "PATH[=ALT]")]
        media: Vec<String>,

        /// Disallow reblogs
        #[arg(long)]
        no_reblog: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    };

    std::process::exit(code);
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<TumblcastError>()
        .map(TumblcastError::exit_code)
        .unwrap_or(EXIT_PERMANENT)
}

fn outcome_exit_code(kind: OutcomeKind) -> i32 {
    match kind {
        OutcomeKind::Success => 0,
        OutcomeKind::TokenExpired => EXIT_TOKEN_EXPIRED,
        OutcomeKind::RetryableFailure => EXIT_RETRYABLE,
        OutcomeKind::PermanentFailure => EXIT_PERMANENT,
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    LoggingConfig::from_settings(&config.logging, cli.verbose).init();

    let credential_path = match cli.credential {
        Some(path) => path,
        None => store::default_path()?,
    };
    let provider = TumblrProvider::new(config.tumblr)?;
    let format = cli.format;

    match cli.command {
        Commands::AuthUrl => auth_url(&provider, format),
        Commands::Exchange { code, verifier } => {
            let credential = provider.authenticate(&code, &verifier).await?;
            store::save(&credential_path, &credential)?;
            info!("Stored credential for {}", credential.subject_id);
            print_credential("Authorized as", &credential, format)
        }
        Commands::Refresh => {
            let current = store::load(&credential_path)?;
            let credential = provider.refresh(&current).await?;
            store::save(&credential_path, &credential)?;
            print_credential("Refreshed credential for", &credential, format)
        }
        Commands::Identity => {
            let credential = fresh_credential(&provider, &credential_path).await?;
            let identity = provider.fetch_identity(&credential.access_token).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&identity)?),
                OutputFormat::Text => {
                    println!("name: {}", identity.display_name);
                    println!("avatar: {}", identity.avatar_url);
                    println!("primary blog: {}", identity.primary_target);
                    println!("blogs: {}", identity.available_targets.join(", "));
                }
            }
            Ok(0)
        }
        Commands::Blogs => {
            let credential = fresh_credential(&provider, &credential_path).await?;
            let blogs = provider.list_targets(&credential.access_token).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&blogs)?),
                OutputFormat::Text => blogs.iter().for_each(|b| println!("{}", b)),
            }
            Ok(0)
        }
        Commands::Post {
            message,
            blog,
            tags,
            media,
            no_reblog,
        } => {
            let item = build_item(message, &media)?;
            post(&provider, &credential_path, item, blog, tags, !no_reblog, format).await
        }
    }
}

fn auth_url(provider: &TumblrProvider, format: OutputFormat) -> Result<i32> {
    let request = provider.authorization_request()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&request)?),
        OutputFormat::Text => {
            println!("{}", request.authorization_url);
            println!("state: {}", request.state);
            println!("verifier: {}", request.verifier);
        }
    }
    Ok(0)
}

// Tokens stay out of the output.
fn print_credential(headline: &str, credential: &Credential, format: OutputFormat) -> Result<i32> {
    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "subject_id": credential.subject_id,
                "display_name": credential.display_name,
                "avatar_url": credential.avatar_url,
                "expires_at": credential.expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("{} {}", headline, credential.display_name);
            println!("expires: {}", credential.expires_at.to_rfc3339());
        }
    }
    Ok(0)
}

/// Load the stored credential, refreshing and saving it first if expired
async fn fresh_credential(provider: &TumblrProvider, path: &Path) -> Result<Credential> {
    let credential = store::load(path)?;
    if !credential.is_expired(Utc::now()) {
        return Ok(credential);
    }

    info!("Credential expired, refreshing");
    let refreshed = provider.refresh(&credential).await?;
    store::save(path, &refreshed)?;
    Ok(refreshed)
}

/// Parse `PATH` or `PATH=ALT` into a media reference
fn parse_media(arg: &str) -> libtumblcast::Result<MediaRef> {
    let (path, alt_text) = match arg.split_once('=') {
        Some((path, alt)) => (path, Some(alt)),
        None => (arg, None),
    };

    let kind = MediaKind::from_path(path).ok_or_else(|| {
        TumblcastError::InvalidInput(format!(
            "Cannot tell the media kind of '{}' from its extension",
            path
        ))
    })?;

    let media = MediaRef::new(path, kind);
    Ok(match alt_text.filter(|a| !a.is_empty()) {
        Some(alt) => media.with_alt_text(alt),
        None => media,
    })
}

fn build_item(message: Option<String>, media: &[String]) -> Result<PostItem> {
    let message = match message {
        Some(message) => message,
        None if !std::io::stdin().is_terminal() => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read message from stdin")?;
            buffer.trim_end().to_string()
        }
        None => String::new(),
    };

    let mut item = PostItem::new(message);
    for arg in media {
        item = item.with_media(parse_media(arg)?);
    }

    if item.message.trim().is_empty() && item.media.is_empty() {
        return Err(TumblcastError::InvalidInput("Nothing to post: give a message or --media".into()).into());
    }

    Ok(item)
}

async fn post(
    provider: &TumblrProvider,
    credential_path: &Path,
    item: PostItem,
    blog: Option<String>,
    tags: Vec<String>,
    allow_reshare: bool,
    format: OutputFormat,
) -> Result<i32> {
    let mut credential = store::load(credential_path)?;

    let target_blog = match blog {
        Some(blog) => blog,
        None => {
            credential = fresh_credential(provider, credential_path).await?;
            provider
                .list_targets(&credential.access_token)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| TumblcastError::InvalidInput("No blog to post to".into()))?
        }
    };

    let settings = PlatformSettings {
        target_blog,
        tags: tags.into_iter().map(Tag::new).collect(),
        allow_reshare,
    };

    let report = provider.publish(&credential, &[item], &settings).await;
    if let Some(refreshed) = &report.refreshed {
        store::save(credential_path, refreshed)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report.outcome)?),
        OutputFormat::Text => match &report.outcome {
            PublishOutcome::Success {
                remote_post_id,
                public_url,
            } => {
                if public_url.is_empty() {
                    println!("{}", remote_post_id);
                } else {
                    println!("{}", public_url);
                }
            }
            other => eprintln!("{}: {}", other.kind(), other.reason().unwrap_or_default()),
        },
    }

    Ok(outcome_exit_code(report.outcome.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_with_alt_text() {
        let media = parse_media("/pics/cat.jpg=A sleeping cat").unwrap();
        assert_eq!(media.local_path, "/pics/cat.jpg");
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.alt_text.as_deref(), Some("A sleeping cat"));
    }

    #[test]
    fn test_parse_media_without_alt_text() {
        let media = parse_media("clip.mp4").unwrap();
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.alt_text, None);

        let media = parse_media("clip.mp4=").unwrap();
        assert_eq!(media.alt_text, None);
    }

    #[test]
    fn test_parse_media_unknown_extension() {
        let err = parse_media("notes.txt").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(outcome_exit_code(OutcomeKind::Success), 0);
        assert_eq!(outcome_exit_code(OutcomeKind::TokenExpired), 2);
        assert_eq!(outcome_exit_code(OutcomeKind::RetryableFailure), 75);
        assert_eq!(outcome_exit_code(OutcomeKind::PermanentFailure), 1);
    }

    #[test]
    fn test_exit_code_for_library_errors() {
        let err = anyhow::Error::from(TumblcastError::InvalidInput("x".into()));
        assert_eq!(exit_code_for(&err), 3);
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_cli_parses_post_flags() {
        let cli = Cli::try_parse_from([
            "tumbl-post",
            "post",
            "hello",
            "--blog",
            "staff",
            "--tag",
            "a",
            "--tag",
            "b",
            "--media",
            "x.png=alt",
            "--no-reblog",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Post {
                message,
                blog,
                tags,
                media,
                no_reblog,
            } => {
                assert_eq!(message.as_deref(), Some("hello"));
                assert_eq!(blog.as_deref(), Some("staff"));
                assert_eq!(tags, vec!["a", "b"]);
                assert_eq!(media, vec!["x.png=alt"]);
                assert!(no_reblog);
            }
            other => panic!("Expected post command, got {:?}", other),
        }
    }
}
