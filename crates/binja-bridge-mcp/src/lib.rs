//! Binja bridge MCP server: exposes a running Binary Ninja HTTP API as MCP
//! tools over stdio.

pub mod config;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{client_config, resolve_server_url};
pub use protocol::ProtocolHandler;
pub use tools::{ActionContext, ActionRegistry};
pub use transport::StdioTransport;
