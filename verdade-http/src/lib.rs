//! Minimal JSON-over-HTTP client with safe logging, bounded retries, and flexible auth.
//!
//! - Request options: headers, [`Auth`], query params, timeout, retries
//! - Redacts secret query params and auth headers; secret values are never logged
//! - Retries network failures, 429 and 5xx with exponential backoff and `Retry-After`
//! - Optional *raw* request/response logging via `VERDADE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), verdade_http::HttpError> {
//! let client = verdade_http::HttpClient::new("https://api.example.com/v1/")?;
//! let got: serde_json::Value = client
//!     .post_json_opts("items", &serde_json::json!({"q": 1}), verdade_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors, and
//! (optionally) raw request/response lines under target `http.raw`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

const RAW_ENV: &str = "VERDADE_HTTP_RAW";
const RAW_MAX_BODY: usize = 16 * 1024;
const SNIPPET_MAX: usize = 500;
const BACKOFF_BASE_MS: u64 = 200;
const RATE_LIMIT_FLOOR_MS: u64 = 1100;
const MAX_RETRY_AFTER_SECS: u64 = 30;

const SECRET_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "x-api-key",
    "x-goog-api-key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret(name: &str) -> bool {
    SECRET_KEYS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(name.trim()))
}

/// Redact sensitive headers for logging.
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("<binary>").to_string()
            };
            (key, val)
        })
        .collect()
}

fn redact_query(q: &[(&str, Cow<'_, str>)]) -> Vec<(String, String)> {
    q.iter()
        .map(|(k, v)| {
            let val = if is_secret(k) {
                "<redacted>".to_string()
            } else {
                v.as_ref().to_string()
            };
            ((*k).to_string(), val)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for upstream API errors, `None` for local/transport failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authentication strategies supported by the client.
///
/// ```
/// use verdade_http::Auth;
/// use reqwest::header::{HeaderName, HeaderValue};
///
/// let auth = Auth::Header {
///     name: HeaderName::from_static("x-api-key"),
///     value: HeaderValue::from_static("sk-test"),
/// };
/// assert!(matches!(auth, Auth::Header { .. }));
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Custom header (e.g. Anthropic's `x-api-key`)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Auth via query param (e.g. Gemini's `key`)
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
    None,
}

impl Auth<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs.
///
/// ```
/// use verdade_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.auth.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. Relative request paths are
    /// joined onto it, so the base should end with `/`.
    ///
    /// ```no_run
    /// use verdade_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1/")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(60));
    /// assert_eq!(client.max_retries, 1);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(60),
            max_retries: 1,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        self.send_json(Method::POST, path, Some(bytes), opts).await
    }

    async fn send_json<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let mut query = opts.query.clone().unwrap_or_default();
        let mut headers = opts.headers.clone().unwrap_or_default();
        let auth = opts.auth.clone().unwrap_or(Auth::None);
        match &auth {
            Auth::Header { name, value } => {
                headers.insert(name.clone(), value.clone());
            }
            Auth::Query { name, value } => query.push((*name, value.clone())),
            Auth::None => {}
        }
        if body.is_some() {
            headers.insert(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let req_id = format!("r{}", Uuid::new_v4().simple());
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(headers.clone());
            if !query.is_empty() {
                let pairs: Vec<(&str, &str)> =
                    query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(bytes) = &body {
                rb = rb.body(bytes.clone());
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query=?redact_query(&query),
                timeout_ms=timeout.as_millis() as u64,
                auth_kind=auth.kind(),
                body_len=body.as_ref().map(|b| b.len()).unwrap_or(0),
                "http.request.start"
            );

            if raw_enabled() {
                tracing::debug!(
                    target: "http.raw",
                    %req_id,
                    headers=?redact_headers(&headers),
                    body=%raw_body(body.as_deref().unwrap_or_default()),
                    "request"
                );
            }

            let t0 = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let resp_headers = resp.headers().clone();
                    resp.bytes()
                        .await
                        .map(|bytes| (status, resp_headers, bytes))
                }
                Err(err) => Err(err),
            };

            let (status, resp_headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    // reqwest errors embed the full URL, query-string keys included
                    let timeout_hit = err.is_timeout();
                    let message = err.without_url().to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt, None, None);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            timeout=timeout_hit,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        timeout=timeout_hit,
                        message=%message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network {
                        message,
                        timeout: timeout_hit,
                    });
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let upstream_id = resp_headers
                .get("request-id")
                .or_else(|| resp_headers.get("x-request-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                upstream_request_id=%upstream_id,
                "http.response.headers"
            );

            if raw_enabled() {
                tracing::debug!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    headers=?redact_headers(&resp_headers),
                    body=%raw_body(&bytes),
                    "response"
                );
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id=%req_id,
                        serde_line=%e.line(),
                        serde_col=%e.column(),
                        serde_err=%e,
                        body_snippet=%snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable && attempt < max_retries {
                attempt += 1;
                let retry_after = retry_after_secs(&resp_headers);
                let delay = backoff_delay(attempt, Some(status), retry_after);
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                upstream_request_id=%upstream_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: upstream_id,
            });
        }
    }
}

/// Delay before retry number `attempt` (1-based).
///
/// `Retry-After` wins when present (capped); otherwise exponential backoff
/// from 200ms, with a floor for 429 responses.
fn backoff_delay(attempt: usize, status: Option<StatusCode>, retry_after: Option<u64>) -> Duration {
    if let Some(secs) = retry_after {
        return Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS));
    }
    let shift = attempt.saturating_sub(1).min(10) as u32;
    let exp = Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << shift));
    if status == Some(StatusCode::TOO_MANY_REQUESTS) {
        exp.max(Duration::from_millis(RATE_LIMIT_FLOOR_MS))
    } else {
        exp
    }
}

/// Pull a human-readable message out of a provider error body.
fn extract_error_message(body: &[u8]) -> String {
    // Anthropic / Gemini / OpenAI: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn snip_body(body: &[u8]) -> String {
    truncate_chars(&String::from_utf8_lossy(body), SNIPPET_MAX)
}

fn raw_body(body: &[u8]) -> String {
    truncate_chars(&String::from_utf8_lossy(body), RAW_MAX_BODY)
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    Ok(s)
}

/// Build a header-carried API key, sanitizing it first.
///
/// ```
/// let auth = verdade_http::header_auth("x-api-key", "  sk-abc\n").unwrap();
/// match auth {
///     verdade_http::Auth::Header { name, value } => {
///         assert_eq!(name.as_str(), "x-api-key");
///         assert_eq!(value.to_str().unwrap(), "sk-abc");
///     }
///     _ => unreachable!(),
/// }
/// ```
pub fn header_auth(name: &'static str, key: &str) -> Result<Auth<'static>, HttpError> {
    let key = sanitize_api_key(key)?;
    let mut value =
        HeaderValue::from_str(&key).map_err(|e| HttpError::Build(format!("invalid API key: {e}")))?;
    value.set_sensitive(true);
    Ok(Auth::Header {
        name: HeaderName::from_static(name),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(1, None, None), Duration::from_millis(200));
        assert_eq!(backoff_delay(2, None, None), Duration::from_millis(400));
        assert_eq!(backoff_delay(3, None, None), Duration::from_millis(800));
    }

    #[test]
    fn backoff_floors_rate_limits_and_honors_retry_after() {
        let status = Some(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(backoff_delay(1, status, None), Duration::from_millis(1100));
        assert_eq!(backoff_delay(1, status, Some(3)), Duration::from_secs(3));
        assert_eq!(
            backoff_delay(1, status, Some(3600)),
            Duration::from_secs(MAX_RETRY_AFTER_SECS)
        );
    }

    #[test]
    fn extracts_nested_error_message() {
        let body = br#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(extract_error_message(body), "invalid x-api-key");
    }

    #[test]
    fn extracts_flat_error_message_or_falls_back_to_snippet() {
        assert_eq!(extract_error_message(br#"{"detail":"slow down"}"#), "slow down");
        assert_eq!(extract_error_message(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn redacts_secret_query_and_headers() {
        let q = vec![("key", Cow::Borrowed("AIza-secret")), ("alt", Cow::Borrowed("json"))];
        let redacted = redact_query(&q);
        assert_eq!(redacted[0], ("key".to_string(), "<redacted>".to_string()));
        assert_eq!(redacted[1], ("alt".to_string(), "json".to_string()));

        let mut h = HeaderMap::new();
        h.insert("x-api-key", HeaderValue::from_static("sk-secret"));
        h.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        let logged = redact_headers(&h);
        assert!(logged.iter().all(|(_, v)| v != "sk-secret"));
        assert!(logged.contains(&("anthropic-version".to_string(), "2023-06-01".to_string())));
    }

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_api_key(" 'sk-a b\tc' ").unwrap(), "sk-abc");
        assert!(sanitize_api_key("   ").is_err());
        assert!(sanitize_api_key("sk-é").is_err());
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let long = "ç".repeat(SNIPPET_MAX + 10);
        let snip = snip_body(long.as_bytes());
        assert!(snip.ends_with("..."));
        assert_eq!(snip.chars().count(), SNIPPET_MAX + 3);
    }
}
