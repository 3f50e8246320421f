//! Core data types shared by the transport and envelope layers.

use std::time::Duration;

use serde_json::Value;

/// Outcome of one logical HTTP operation, after any 503 retries.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// 2xx response.
    Success {
        status: u16,
        body: String,
        json: Option<Value>,
    },
    /// Any non-2xx response, including a 503 that outlived the retry budget.
    HttpError {
        status: u16,
        body: String,
        json: Option<Value>,
    },
    /// Connection refused, DNS failure, timeout, unreadable body.
    TransportFailure(String),
}

/// Timeout class chosen by each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Lightweight status checks (`short_timeout_seconds`).
    Status,
    /// Most actions.
    Default,
    /// Expensive analysis operations (`long_timeout_seconds`).
    Long,
    /// No request timeout. The 503 retry deadline still applies.
    Unbounded,
    Custom(Duration),
}

/// Timeout used by ordinary actions.
pub const DEFAULT_TIMEOUT_SECS: f64 = 20.0;

/// Errors raised inside the transport layer. They never cross the public
/// fetch functions; those fold them into a [`RequestOutcome::TransportFailure`].
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        BridgeError::Transport(error_chain(&e))
    }
}

/// Render an error with its full source chain, `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_includes_sources() {
        let err = Outer(std::io::Error::other("connection refused"));
        assert_eq!(error_chain(&err), "outer: connection refused");
    }
}
