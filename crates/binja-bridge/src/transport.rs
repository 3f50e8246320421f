//! Upstream transport: bounded retry on 503 and uniform failure capture.
//!
//! Every public fetch returns a value. Connection errors, timeouts and HTTP
//! errors are folded into the return shape, never raised.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::backend::{HttpBackend, HttpMethod, HttpRequest, PostBody, RawResponse, ReqwestBackend};
use crate::config::{PolicySource, RetryPolicy, ServerUrl};
use crate::query::{build_url, Params};
use crate::types::{BridgeResult, RequestOutcome, Timeout};

/// Status the upstream uses for "busy, retry later".
pub const SERVICE_BUSY: u16 = 503;

/// Sleep used when the computed retry wait rounds to zero.
const MIN_RETRY_SLEEP: Duration = Duration::from_millis(100);

/// Client for the upstream analysis server.
#[derive(Clone)]
pub struct Transport {
    server_url: ServerUrl,
    backend: Arc<dyn HttpBackend>,
    policy: PolicySource,
}

impl Transport {
    /// Production transport: reqwest backend, policy re-read from the
    /// environment on every call.
    pub fn new(server_url: ServerUrl) -> Self {
        Self::with_backend(server_url, Arc::new(ReqwestBackend::new()))
    }

    pub fn with_backend(server_url: ServerUrl, backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            server_url,
            backend,
            policy: PolicySource::Env,
        }
    }

    pub fn with_policy(mut self, policy: PolicySource) -> Self {
        self.policy = policy;
        self
    }

    pub fn server_url(&self) -> &ServerUrl {
        &self.server_url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy.current()
    }

    /// GET and split the body into lines.
    ///
    /// HTTP errors become a single `Error <status>: <body>` line, transport
    /// failures a single `Request failed: <message>` line. An empty body
    /// yields no lines.
    pub fn get_lines(&self, endpoint: &str, params: &Params, timeout: Timeout) -> Vec<String> {
        match self.get(endpoint, params, timeout) {
            RequestOutcome::Success { body, .. } => body.lines().map(str::to_string).collect(),
            RequestOutcome::HttpError { status, body, .. } => {
                vec![http_error_text(status, &body)]
            }
            RequestOutcome::TransportFailure(message) => vec![request_failed_text(&message)],
        }
    }

    /// GET and return the whole body, or the same synthesized error strings
    /// as [`Transport::get_lines`].
    pub fn get_text(&self, endpoint: &str, params: &Params, timeout: Timeout) -> String {
        text_result(self.get(endpoint, params, timeout), false)
    }

    /// GET and parse the body as JSON.
    ///
    /// A 2xx with an empty or non-JSON body yields `None`. Errors always
    /// yield a mapping carrying an `error` key.
    pub fn get_json(&self, endpoint: &str, params: &Params, timeout: Timeout) -> Option<Value> {
        json_result(self.get(endpoint, params, timeout))
    }

    /// POST and parse the response with the rules of [`Transport::get_json`].
    pub fn post_json(&self, endpoint: &str, body: PostBody, timeout: Timeout) -> Option<Value> {
        json_result(self.post(endpoint, body, timeout))
    }

    /// POST and return the trimmed response text, or a synthesized error
    /// string.
    pub fn post_text(&self, endpoint: &str, body: PostBody, timeout: Timeout) -> String {
        text_result(self.post(endpoint, body, timeout), true)
    }

    /// Best-effort lookup of the file the upstream currently has selected.
    ///
    /// Uses the short status timeout. Any failure is `None`; callers pick the
    /// fallback.
    pub fn active_filename(&self) -> Option<String> {
        let status = self.get_json("status", &Params::new(), Timeout::Status)?;
        match status.get("filename")? {
            Value::String(name) if !name.is_empty() => Some(name.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, endpoint: &str, params: &Params, timeout: Timeout) -> RequestOutcome {
        self.outcome(HttpMethod::Get, endpoint, params, None, timeout)
    }

    pub fn post(&self, endpoint: &str, body: PostBody, timeout: Timeout) -> RequestOutcome {
        self.outcome(HttpMethod::Post, endpoint, &Params::new(), Some(body), timeout)
    }

    fn outcome(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: &Params,
        body: Option<PostBody>,
        timeout: Timeout,
    ) -> RequestOutcome {
        let policy = self.policy();
        let request = HttpRequest {
            method,
            url: build_url(&self.server_url.get(), endpoint, params),
            body,
            timeout: policy.timeout(timeout),
        };

        match self.send_with_retry(&request, &policy) {
            Ok(response) => classify(response),
            Err(e) => {
                tracing::debug!("{} {} failed: {e}", method.as_str(), request.url);
                RequestOutcome::TransportFailure(e.to_string())
            }
        }
    }

    /// Issue the request, retrying while the server answers 503 and the
    /// retry budget lasts. Any other status is returned immediately.
    fn send_with_retry(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
    ) -> BridgeResult<RawResponse> {
        let deadline = policy.retry_deadline(Instant::now());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "{} {} (attempt {attempt})",
                request.method.as_str(),
                request.url
            );
            let response = self.backend.execute(request)?;

            if response.status != SERVICE_BUSY {
                return Ok(response);
            }
            let Some(deadline) = deadline else {
                return Ok(response);
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    "{} still busy after {attempt} attempts, giving up",
                    request.url
                );
                return Ok(response);
            }

            let wait_secs = response
                .retry_after_seconds()
                .unwrap_or(policy.default_retry_after_seconds)
                .min(remaining.as_secs_f64());
            let wait = Duration::try_from_secs_f64(wait_secs.max(0.0)).unwrap_or_default();
            let wait = if wait.is_zero() { MIN_RETRY_SLEEP } else { wait };

            tracing::info!(
                "Upstream busy (503) on {}, retrying in {:.2}s",
                request.url,
                wait.as_secs_f64()
            );
            std::thread::sleep(wait);
        }
    }
}

fn classify(response: RawResponse) -> RequestOutcome {
    let body = response.text();
    let json = parse_json(&body);
    if response.is_success() {
        RequestOutcome::Success {
            status: response.status,
            body,
            json,
        }
    } else {
        RequestOutcome::HttpError {
            status: response.status,
            body,
            json,
        }
    }
}

fn parse_json(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

fn http_error_text(status: u16, body: &str) -> String {
    format!("Error {status}: {}", body.trim())
}

fn request_failed_text(message: &str) -> String {
    format!("Request failed: {message}")
}

fn text_result(outcome: RequestOutcome, trim: bool) -> String {
    match outcome {
        RequestOutcome::Success { body, .. } if trim => body.trim().to_string(),
        RequestOutcome::Success { body, .. } => body,
        RequestOutcome::HttpError { status, body, .. } => http_error_text(status, &body),
        RequestOutcome::TransportFailure(message) => request_failed_text(&message),
    }
}

fn json_result(outcome: RequestOutcome) -> Option<Value> {
    match outcome {
        RequestOutcome::Success { json, .. } => json,
        RequestOutcome::HttpError {
            status,
            body,
            json: Some(Value::Object(mut map)),
        } => {
            if !map.contains_key("error") {
                map.insert("error".to_string(), Value::String(body.trim().to_string()));
            }
            map.insert("status".to_string(), Value::from(status));
            Some(Value::Object(map))
        }
        RequestOutcome::HttpError { status, body, .. } => {
            Some(error_object(http_error_text(status, &body)))
        }
        RequestOutcome::TransportFailure(message) => {
            Some(error_object(request_failed_text(&message)))
        }
    }
}

fn error_object(message: String) -> Value {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(message));
    Value::Object(map)
}
