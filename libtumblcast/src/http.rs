//! Shared HTTP plumbing for platform calls
//!
//! A thin wrapper around `reqwest::Client` that knows the API base URL,
//! builds endpoint URLs from path segments and logs every exchange. It never
//! retries: retry policy belongs to whoever schedules publish calls.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, Url};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Status, final URL and body text of a completed exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects
    pub url: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client rooted at `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "tumblr.api_base_url".to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "tumblr.api_base_url".to_string(),
                reason: format!("'{}' cannot be used as a base URL", base_url),
            }
            .into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tumblcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL below the base URL
    ///
    /// Each segment is percent-encoded, so blog names can be passed verbatim.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send the request and read the whole body as text
    ///
    /// Non-2xx statuses are returned as responses, not errors; only transport
    /// failures (connect, timeout, body read) surface as `Err`.
    pub async fn execute(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> std::result::Result<RawResponse, reqwest::Error> {
        let response = self.send(operation, builder).await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        Ok(RawResponse { status, url, body })
    }

    /// Send the request and keep only status and final URL
    ///
    /// The body is dropped unread.
    pub async fn locate(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> std::result::Result<RawResponse, reqwest::Error> {
        let response = self.send(operation, builder).await?;
        Ok(RawResponse {
            status: response.status().as_u16(),
            url: response.url().to_string(),
            body: String::new(),
        })
    }

    async fn send(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> std::result::Result<Response, reqwest::Error> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();

        debug!(operation, %method, %url, "sending HTTP request");

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(operation, %method, %url, error = %err, "HTTP request failed");
                return Err(err);
            }
        };

        debug!(
            operation,
            %method,
            %url,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received HTTP response"
        );

        Ok(response)
    }
}
