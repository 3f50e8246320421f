//! In-memory backends for exercising the transport without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::backend::{HttpBackend, HttpRequest, RawResponse};
use crate::config::{PolicySource, RetryPolicy, ServerUrl};
use crate::transport::Transport;
use crate::types::{BridgeError, BridgeResult};

/// Base URL used by transports built here.
pub const TEST_BASE_URL: &str = "http://bn.test:9009";

type Reply = Result<RawResponse, String>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pops one reply per call and repeats the last one once the script runs out.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    pub fn reply(status: u16, body: &str) -> Arc<Self> {
        Self::new(vec![Ok(RawResponse::new(status, body))])
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn urls(&self) -> Vec<String> {
        lock(&self.requests).iter().map(|r| r.url.clone()).collect()
    }
}

impl HttpBackend for ScriptedBackend {
    fn execute(&self, request: &HttpRequest) -> BridgeResult<RawResponse> {
        lock(&self.requests).push(request.clone());
        let reply = match lock(&self.replies).pop_front() {
            Some(reply) => {
                *lock(&self.last) = Some(reply.clone());
                reply
            }
            None => lock(&self.last)
                .clone()
                .unwrap_or_else(|| Err("no scripted reply".to_string())),
        };
        reply.map_err(BridgeError::Transport)
    }
}

/// Answers by endpoint path; unknown paths get a 404.
#[derive(Default)]
pub struct RoutedBackend {
    routes: Mutex<HashMap<String, Reply>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RoutedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` with `status` for `endpoint` (no leading slash).
    pub fn route(self: Arc<Self>, endpoint: &str, status: u16, body: &str) -> Arc<Self> {
        self.set(endpoint, Ok(RawResponse::new(status, body)));
        self
    }

    /// Fail `endpoint` at the transport level.
    pub fn fail(self: Arc<Self>, endpoint: &str, message: &str) -> Arc<Self> {
        self.set(endpoint, Err(message.to_string()));
        self
    }

    /// Sleep for `delay` before answering `endpoint`.
    pub fn delay(self: Arc<Self>, endpoint: &str, delay: Duration) -> Arc<Self> {
        lock(&self.delays).insert(endpoint.trim_start_matches('/').to_string(), delay);
        self
    }

    fn set(&self, endpoint: &str, reply: Reply) {
        lock(&self.routes).insert(endpoint.trim_start_matches('/').to_string(), reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Requests whose path is exactly `endpoint`.
    pub fn requests_to(&self, endpoint: &str) -> Vec<HttpRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| path_of(&r.url) == endpoint)
            .cloned()
            .collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .map(|r| path_of(&r.url).to_string())
            .collect()
    }
}

impl HttpBackend for RoutedBackend {
    fn execute(&self, request: &HttpRequest) -> BridgeResult<RawResponse> {
        lock(&self.requests).push(request.clone());
        let delay = lock(&self.delays).get(path_of(&request.url)).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let reply = lock(&self.routes)
            .get(path_of(&request.url))
            .cloned()
            .unwrap_or_else(|| Ok(RawResponse::new(404, r#"{"error": "Not found"}"#)));
        reply.map_err(BridgeError::Transport)
    }
}

/// Path of a URL built by this crate, without base or query.
pub fn path_of(url: &str) -> &str {
    let rest = url.strip_prefix(TEST_BASE_URL).unwrap_or(url);
    let rest = rest.split('?').next().unwrap_or(rest);
    rest.trim_start_matches('/')
}

/// Query pairs of a URL, decoded.
pub fn query_of(url: &str) -> Vec<(String, String)> {
    match url.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
        None => Vec::new(),
    }
}

/// Policy with short waits and the given retry budget.
pub fn fast_policy(max_wait: f64) -> PolicySource {
    PolicySource::Fixed(RetryPolicy {
        max_wait_seconds: max_wait,
        default_retry_after_seconds: 0.05,
        ..RetryPolicy::default()
    })
}

/// Transport over `backend` with a one second retry budget.
pub fn test_transport(backend: Arc<dyn HttpBackend>) -> Transport {
    Transport::with_backend(ServerUrl::new(TEST_BASE_URL), backend).with_policy(fast_policy(1.0))
}
