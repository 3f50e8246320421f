//! Blocking HTTP backend wrapping reqwest.
//!
//! One call to [`HttpBackend::execute`] is exactly one HTTP exchange; retry
//! policy lives in the transport above it.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};

use crate::query::{encode_form, Params};
use crate::types::BridgeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// POST payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    /// Form-encoded mapping.
    Form(Params),
    /// Pre-encoded string, sent as raw UTF-8 bytes.
    Raw(String),
}

impl PostBody {
    fn encode(&self) -> (Option<&'static str>, Vec<u8>) {
        match self {
            PostBody::Form(params) => (
                Some("application/x-www-form-urlencoded"),
                encode_form(params).into_bytes(),
            ),
            PostBody::Raw(text) => (None, text.as_bytes().to_vec()),
        }
    }
}

/// A fully resolved request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<PostBody>,
    /// `None` means no timeout at all.
    pub timeout: Option<Duration>,
}

/// A response as received, before any interpretation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `Retry-After` header value, if any.
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, regardless of any charset the server announced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Seconds from a float-parseable `Retry-After` header, clamped at zero.
    pub fn retry_after_seconds(&self) -> Option<f64> {
        self.retry_after
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|secs| !secs.is_nan())
            .map(|secs| secs.max(0.0))
    }
}

/// Executes single HTTP exchanges.
pub trait HttpBackend: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> BridgeResult<RawResponse>;
}

/// Production backend.
///
/// The reqwest client is built on the first request, so it is always created
/// on a worker thread and never inside an async context.
#[derive(Default)]
pub struct ReqwestBackend {
    client: OnceLock<reqwest::blocking::Client>,
}

impl ReqwestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> &reqwest::blocking::Client {
        self.client.get_or_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(None::<Duration>)
                .user_agent(concat!("binja-bridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default()
        })
    }
}

impl HttpBackend for ReqwestBackend {
    fn execute(&self, request: &HttpRequest) -> BridgeResult<RawResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client().request(method, &request.url);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            let (content_type, bytes) = body.encode();
            if let Some(content_type) = content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(bytes);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
