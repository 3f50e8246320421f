//! Configuration resolution and the client configuration snippet.

use serde_json::{json, Value};

use binja_bridge::config::ENV_URL;

pub use binja_bridge::config::resolve_server_url;

/// Key under `mcpServers` that desktop clients look this server up by.
pub const CLIENT_CONFIG_KEY: &str = "binary_ninja_mcp";

/// Seconds a client should wait on a single tool call.
pub const CLIENT_TIMEOUT_SECS: u64 = 1800;

/// Path of the running executable, falling back to the binary name.
pub fn current_command() -> String {
    std::env::current_exe()
        .ok()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Client configuration that launches `command serve` against `server_url`.
pub fn client_config(command: &str, server_url: &str) -> Value {
    let mut servers = serde_json::Map::new();
    servers.insert(
        CLIENT_CONFIG_KEY.to_string(),
        json!({
            "command": command,
            "args": ["serve"],
            "env": { ENV_URL: server_url },
            "timeout": CLIENT_TIMEOUT_SECS,
            "disabled": false,
        }),
    );
    json!({ "mcpServers": servers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_shape() {
        let cfg = client_config("/usr/local/bin/binja-bridge-mcp", "http://localhost:9009");
        let server = &cfg["mcpServers"]["binary_ninja_mcp"];
        assert_eq!(server["command"], "/usr/local/bin/binja-bridge-mcp");
        assert_eq!(server["args"], json!(["serve"]));
        assert_eq!(server["env"]["BINARY_NINJA_MCP_URL"], "http://localhost:9009");
        assert_eq!(server["timeout"], 1800);
        assert_eq!(server["disabled"], false);
    }

    #[test]
    fn test_current_command_is_not_empty() {
        assert!(!current_command().is_empty());
    }
}
