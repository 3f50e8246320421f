//! Binja bridge: HTTP transport, retry policy and response envelopes for the
//! Binary Ninja MCP bridge.

pub mod address;
pub mod backend;
pub mod config;
pub mod envelope;
pub mod pagination;
pub mod query;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;
pub mod types;

pub use address::is_int_like;
pub use backend::{HttpBackend, HttpMethod, HttpRequest, PostBody, RawResponse, ReqwestBackend};
pub use config::{resolve_server_url, PolicySource, RetryPolicy, ServerUrl};
pub use envelope::{active_file, file_or_none, Envelope, NO_FILE};
pub use pagination::{fetch_paginated, PageQuery};
pub use transport::Transport;
pub use types::*;
