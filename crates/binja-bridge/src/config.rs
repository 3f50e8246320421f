//! Configuration loading and resolution.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::types::{Timeout, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9009;

pub const ENV_URL: &str = "BINARY_NINJA_MCP_URL";
pub const ENV_HOST: &str = "BINARY_NINJA_MCP_HOST";
pub const ENV_PORT: &str = "BINARY_NINJA_MCP_PORT";
pub const ENV_RETRY_MAX_WAIT: &str = "BINARY_NINJA_MCP_RETRY_MAX_WAIT";
pub const ENV_RETRY_AFTER: &str = "BINARY_NINJA_MCP_RETRY_AFTER";
pub const ENV_STATUS_TIMEOUT: &str = "BINARY_NINJA_MCP_STATUS_TIMEOUT";
pub const ENV_LONG_TIMEOUT: &str = "BINARY_NINJA_MCP_LONG_TIMEOUT";
pub const ENV_WORKERS: &str = "BINARY_NINJA_MCP_WORKERS";

const DEFAULT_WORKERS: usize = 16;

/// Resolve the upstream HTTP server URL.
///
/// Precedence: explicit URL, `BINARY_NINJA_MCP_URL`, then host/port (argument,
/// environment, default).
pub fn resolve_server_url(url: Option<&str>, host: Option<&str>, port: Option<u16>) -> String {
    resolve_server_url_with(|key| std::env::var(key).ok(), url, host, port)
}

pub fn resolve_server_url_with(
    lookup: impl Fn(&str) -> Option<String>,
    url: Option<&str>,
    host: Option<&str>,
    port: Option<u16>,
) -> String {
    if let Some(url) = url.filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    if let Some(env_url) = lookup(ENV_URL).filter(|u| !u.is_empty()) {
        return env_url;
    }

    let host = host
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| lookup(ENV_HOST).filter(|h| !h.is_empty()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match port {
        Some(port) => port.to_string(),
        None => match lookup(ENV_PORT).filter(|p| !p.trim().is_empty()) {
            // A non-numeric port is passed through untouched.
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map(|p| p.to_string())
                .unwrap_or(raw),
            None => DEFAULT_PORT.to_string(),
        },
    };

    format!("http://{host}:{port}")
}

/// Number of worker threads actions may occupy at once.
pub fn worker_count() -> usize {
    std::env::var(ENV_WORKERS)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_WORKERS)
        .max(1)
}

/// Retry and timeout settings for upstream calls, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total time budget for retrying 503 responses. `<= 0` disables retry.
    pub max_wait_seconds: f64,
    /// Wait used when a 503 carries no usable `Retry-After` header.
    pub default_retry_after_seconds: f64,
    pub short_timeout_seconds: f64,
    pub long_timeout_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_wait_seconds: 20.0,
            default_retry_after_seconds: 5.0,
            short_timeout_seconds: 3.0,
            long_timeout_seconds: 120.0,
        }
    }
}

impl RetryPolicy {
    /// Read the policy from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the policy through an arbitrary key lookup. Missing, unparseable
    /// and non-finite values fall back to the default for that key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: f64| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };

        Self {
            max_wait_seconds: read(ENV_RETRY_MAX_WAIT, defaults.max_wait_seconds),
            default_retry_after_seconds: read(
                ENV_RETRY_AFTER,
                defaults.default_retry_after_seconds,
            ),
            short_timeout_seconds: read(ENV_STATUS_TIMEOUT, defaults.short_timeout_seconds),
            long_timeout_seconds: read(ENV_LONG_TIMEOUT, defaults.long_timeout_seconds),
        }
    }

    /// Deadline for 503 retries, or `None` when retrying is disabled.
    pub fn retry_deadline(&self, now: Instant) -> Option<Instant> {
        if self.max_wait_seconds <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.max_wait_seconds)
            .ok()
            .and_then(|budget| now.checked_add(budget))
    }

    /// Resolve a timeout class into a concrete request timeout.
    pub fn timeout(&self, class: Timeout) -> Option<Duration> {
        let defaults = Self::default();
        let (secs, fallback) = match class {
            Timeout::Status => (self.short_timeout_seconds, defaults.short_timeout_seconds),
            Timeout::Default => (DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS),
            Timeout::Long => (self.long_timeout_seconds, defaults.long_timeout_seconds),
            Timeout::Unbounded => return None,
            Timeout::Custom(d) => return Some(d),
        };
        // Only `Unbounded` waits forever; a non-positive setting reads as unset.
        let secs = if secs > 0.0 { secs } else { fallback };
        Duration::try_from_secs_f64(secs)
            .ok()
            .or_else(|| Duration::try_from_secs_f64(fallback).ok())
    }
}

/// Where the transport reads its retry policy from on each request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PolicySource {
    /// Re-read the environment on every call.
    #[default]
    Env,
    Fixed(RetryPolicy),
}

impl PolicySource {
    pub fn current(&self) -> RetryPolicy {
        match self {
            PolicySource::Env => RetryPolicy::from_env(),
            PolicySource::Fixed(policy) => *policy,
        }
    }
}

/// Process-wide upstream base URL. Written at startup, read by every request.
#[derive(Debug, Clone)]
pub struct ServerUrl {
    inner: Arc<RwLock<String>>,
}

impl ServerUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(normalize(url.into()))),
        }
    }

    pub fn get(&self) -> String {
        match self.inner.read() {
            Ok(url) => url.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, url: impl Into<String>) {
        let url = normalize(url.into());
        tracing::info!("Upstream server URL set to {url}");
        match self.inner.write() {
            Ok(mut slot) => *slot = url,
            Err(poisoned) => *poisoned.into_inner() = url,
        }
    }
}

fn normalize(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
