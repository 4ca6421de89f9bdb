//! Tumblr response classification
//!
//! Tumblr multiplexes many failure meanings onto a handful of HTTP statuses and
//! disambiguates them with numeric error codes inside the response envelope.
//! [`classify`] reduces a `(status, code)` pair to an [`OutcomeKind`] through
//! an ordered rule table; [`classify_response`] parses a raw body into a
//! [`PublishOutcome`], never failing on malformed input.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{OutcomeKind, PublishOutcome};

/// Which platform error codes a rule applies to
#[derive(Debug, Clone, Copy)]
enum CodeRule {
    Any,
    OneOf(&'static [u32]),
}

struct Rule {
    status: u16,
    code: CodeRule,
    kind: OutcomeKind,
    description: &'static str,
}

impl Rule {
    fn matches(&self, status: u16, code: Option<u32>) -> bool {
        let code_ok = match self.code {
            CodeRule::Any => true,
            CodeRule::OneOf(codes) => code.is_some_and(|c| codes.contains(&c)),
        };
        self.status == status && code_ok
    }
}

const fn rule(status: u16, code: CodeRule, kind: OutcomeKind, description: &'static str) -> Rule {
    Rule {
        status,
        code,
        kind,
        description,
    }
}

use CodeRule::{Any, OneOf};
use OutcomeKind::{PermanentFailure, RetryableFailure, Success, TokenExpired};

/// Ordered classification rules; the first match wins
static RULES: &[Rule] = &[
    rule(200, Any, Success, "ok"),
    rule(201, Any, Success, "created"),
    rule(400, OneOf(&[8001]), PermanentFailure, "malformed post payload"),
    rule(400, OneOf(&[8002]), PermanentFailure, "invalid parent post reference"),
    rule(400, OneOf(&[8005]), PermanentFailure, "uploaded media is in an unsupported format"),
    rule(400, OneOf(&[8016]), PermanentFailure, "invalid post layout"),
    rule(400, Any, PermanentFailure, "malformed request"),
    rule(401, Any, TokenExpired, "access token rejected, refresh required"),
    rule(403, OneOf(&[8004]), RetryableFailure, "daily video upload limit reached"),
    rule(403, OneOf(&[8008]), RetryableFailure, "too many videos transcoding at once"),
    rule(403, OneOf(&[8010]), RetryableFailure, "daily post limit reached"),
    rule(403, OneOf(&[8011]), RetryableFailure, "post queue is full"),
    rule(403, OneOf(&[8022]), RetryableFailure, "daily image upload limit reached"),
    rule(403, OneOf(&[8023]), RetryableFailure, "daily media upload limit reached"),
    rule(404, Any, PermanentFailure, "referenced resource not found"),
    rule(500, OneOf(&[8006, 8009]), RetryableFailure, "media upload failed on the platform"),
    rule(500, Any, RetryableFailure, "platform server error"),
    rule(503, Any, RetryableFailure, "service temporarily unavailable"),
];

/// Result of a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: OutcomeKind,
    pub description: &'static str,
}

/// Classify a `(status, code)` pair
///
/// Pairs no rule covers are permanent failures.
pub fn classify(status: u16, code: Option<u32>) -> Classification {
    RULES
        .iter()
        .find(|r| r.matches(status, code))
        .map(|r| Classification {
            kind: r.kind,
            description: r.description,
        })
        .unwrap_or(Classification {
            kind: PermanentFailure,
            description: "unrecognized platform response",
        })
}

/// Standard Tumblr response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub meta: Meta,
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Meta {
    pub status: u16,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub detail: String,
}

impl Envelope {
    /// Code of the first reported error
    pub fn error_code(&self) -> Option<u32> {
        self.errors.first().and_then(|e| e.code)
    }

    fn error_detail(&self) -> String {
        self.errors
            .first()
            .map(|e| {
                if e.detail.is_empty() {
                    e.title.clone()
                } else {
                    e.detail.clone()
                }
            })
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.meta.msg.clone())
    }
}

/// Pull a post id out of a creation response
///
/// Tumblr sends ids as strings (`id_string`/`id`) or as bare numbers.
pub fn extract_post_id(response: &Value) -> Option<String> {
    ["id_string", "id"]
        .iter()
        .filter_map(|key| response.get(key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Reduce an HTTP status and raw body to a publish outcome
///
/// The public URL of a success is left empty; resolving it is a separate read.
pub fn classify_response(status: u16, body: &str) -> PublishOutcome {
    let envelope = match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope,
        Err(e) => return classify_unparsed(status, body, &e.to_string()),
    };

    let code = envelope.error_code();
    let classification = classify(status, code);
    let code_label = code.map(|c| format!(" [code {}]", c)).unwrap_or_default();

    match classification.kind {
        Success => match extract_post_id(&envelope.response) {
            Some(remote_post_id) => PublishOutcome::Success {
                remote_post_id,
                public_url: String::new(),
            },
            None => PublishOutcome::permanent(format!(
                "HTTP {} without a post id in the response: {}",
                status, body
            )),
        },
        RetryableFailure => PublishOutcome::retryable(format!(
            "{}{}: {}",
            classification.description,
            code_label,
            envelope.error_detail()
        )),
        TokenExpired => PublishOutcome::token_expired(format!(
            "{}: {}",
            classification.description,
            envelope.error_detail()
        )),
        PermanentFailure => PublishOutcome::permanent(format!(
            "{}{} (HTTP {}): {}; body: {}",
            classification.description,
            code_label,
            status,
            envelope.error_detail(),
            body
        )),
    }
}

fn classify_unparsed(status: u16, body: &str, parse_error: &str) -> PublishOutcome {
    // A success we cannot read is not a success.
    if (200..300).contains(&status) {
        return PublishOutcome::permanent(format!(
            "unparseable HTTP {} response ({}): {}",
            status, parse_error, body
        ));
    }

    let classification = classify(status, None);
    match classification.kind {
        RetryableFailure => PublishOutcome::retryable(format!(
            "{} (HTTP {})",
            classification.description, status
        )),
        TokenExpired => PublishOutcome::token_expired(format!(
            "{} (HTTP {})",
            classification.description, status
        )),
        Success | PermanentFailure => PublishOutcome::permanent(format!(
            "{} (HTTP {}, unparseable body): {}",
            classification.description, status, body
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(status: u16, code: u32, detail: &str) -> String {
        serde_json::json!({
            "meta": {"status": status, "msg": "Error"},
            "response": [],
            "errors": [{"title": "Error", "code": code, "detail": detail}]
        })
        .to_string()
    }

    #[test]
    fn test_classify_table_examples() {
        assert_eq!(classify(403, Some(8022)).kind, RetryableFailure);
        assert_eq!(classify(401, None).kind, TokenExpired);
        assert_eq!(classify(401, Some(1234)).kind, TokenExpired);
        assert_eq!(classify(400, Some(8001)).kind, PermanentFailure);
        assert_eq!(classify(503, None).kind, RetryableFailure);
        assert_eq!(classify(503, Some(1)).kind, RetryableFailure);
        assert_eq!(classify(599, Some(99999)).kind, PermanentFailure);
    }

    #[test]
    fn test_classify_success_statuses() {
        assert_eq!(classify(200, None).kind, Success);
        assert_eq!(classify(201, None).kind, Success);
        assert_eq!(classify(204, None).kind, PermanentFailure);
    }

    #[test]
    fn test_classify_bad_request_codes() {
        for code in [8001, 8002, 8005, 8016] {
            let c = classify(400, Some(code));
            assert_eq!(c.kind, PermanentFailure);
            assert_ne!(c.description, "malformed request", "code {code} has its own rule");
        }
        assert_eq!(classify(400, Some(1)).description, "malformed request");
        assert_eq!(classify(400, None).kind, PermanentFailure);
    }

    #[test]
    fn test_classify_forbidden_limits_are_retryable() {
        for code in [8004, 8008, 8010, 8011, 8022, 8023] {
            assert_eq!(classify(403, Some(code)).kind, RetryableFailure, "code {code}");
        }
        // A forbidden response without a limit code is not something waiting fixes.
        assert_eq!(classify(403, None).kind, PermanentFailure);
        assert_eq!(classify(403, Some(1)).kind, PermanentFailure);
    }

    #[test]
    fn test_classify_server_errors() {
        assert_eq!(classify(500, Some(8006)).kind, RetryableFailure);
        assert_eq!(classify(500, Some(8009)).kind, RetryableFailure);
        assert_eq!(
            classify(500, Some(8006)).description,
            "media upload failed on the platform"
        );
        assert_eq!(classify(500, None).kind, RetryableFailure);
        assert_eq!(classify(502, None).kind, PermanentFailure);
        assert_eq!(classify(404, Some(0)).kind, PermanentFailure);
    }

    #[test]
    fn test_classify_response_success_with_string_id() {
        let body = r#"{"meta":{"status":201,"msg":"Created"},"response":{"id":"1234567891234567","state":"published"}}"#;
        assert_eq!(
            classify_response(201, body),
            PublishOutcome::Success {
                remote_post_id: "1234567891234567".into(),
                public_url: String::new(),
            }
        );
    }

    #[test]
    fn test_classify_response_success_with_numeric_id() {
        let body = r#"{"meta":{"status":201,"msg":"Created"},"response":{"id":42}}"#;
        match classify_response(201, body) {
            PublishOutcome::Success { remote_post_id, .. } => assert_eq!(remote_post_id, "42"),
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_prefers_id_string() {
        let body = r#"{"meta":{"status":201},"response":{"id":1.2e17,"id_string":"123456789012345678"}}"#;
        match classify_response(201, body) {
            PublishOutcome::Success { remote_post_id, .. } => {
                assert_eq!(remote_post_id, "123456789012345678")
            }
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_success_without_id_is_permanent() {
        let body = r#"{"meta":{"status":201,"msg":"Created"},"response":{}}"#;
        match classify_response(201, body) {
            PublishOutcome::PermanentFailure { reason } => {
                assert!(reason.contains("without a post id"));
                assert!(reason.contains(body));
            }
            other => panic!("Expected permanent failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_quota_error() {
        let outcome = classify_response(403, &envelope(403, 8022, "Daily image upload limit"));
        match outcome {
            PublishOutcome::RetryableFailure { reason } => {
                assert!(reason.contains("8022"));
                assert!(reason.contains("Daily image upload limit"));
            }
            other => panic!("Expected retryable failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_uses_first_error_code_only() {
        let body = serde_json::json!({
            "meta": {"status": 403, "msg": "Forbidden"},
            "response": [],
            "errors": [
                {"title": "Forbidden", "detail": "No posting rights"},
                {"title": "Limit", "code": 8022, "detail": "Daily image upload limit"}
            ]
        })
        .to_string();
        assert_eq!(classify_response(403, &body).kind(), PermanentFailure);
    }

    #[test]
    fn test_classify_response_permanent_keeps_body() {
        let body = envelope(400, 8005, "Unsupported format");
        match classify_response(400, &body) {
            PublishOutcome::PermanentFailure { reason } => {
                assert!(reason.contains("unsupported format"));
                assert!(reason.contains(&body));
            }
            other => panic!("Expected permanent failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_unauthorized() {
        let body = r#"{"meta":{"status":401,"msg":"Unauthorized"},"response":[]}"#;
        match classify_response(401, body) {
            PublishOutcome::TokenExpired { reason } => assert!(reason.contains("Unauthorized")),
            other => panic!("Expected token expired, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_unparseable_success() {
        match classify_response(200, "<html>ok</html>") {
            PublishOutcome::PermanentFailure { reason } => {
                assert!(reason.contains("<html>ok</html>"))
            }
            other => panic!("Expected permanent failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_response_unparseable_error_bodies() {
        assert_eq!(
            classify_response(503, "<html>Service Unavailable</html>").kind(),
            RetryableFailure
        );
        assert_eq!(classify_response(401, "").kind(), TokenExpired);
        match classify_response(599, "garbage") {
            PublishOutcome::PermanentFailure { reason } => assert!(reason.contains("garbage")),
            other => panic!("Expected permanent failure, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_post_id_shapes() {
        assert_eq!(
            extract_post_id(&serde_json::json!({"id": "9"})),
            Some("9".to_string())
        );
        assert_eq!(extract_post_id(&serde_json::json!({"id": ""})), None);
        assert_eq!(extract_post_id(&serde_json::json!([])), None);
    }
}
