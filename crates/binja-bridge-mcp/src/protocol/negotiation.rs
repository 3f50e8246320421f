//! MCP capability negotiation and per-connection client state.

use crate::types::{
    ClientCapabilities, InitializeParams, InitializeResult, McpError, McpResult, MCP_VERSION,
};

/// Log levels a client may request through `logging/setLevel`.
pub const LOG_LEVELS: &[&str] = &[
    "debug",
    "info",
    "notice",
    "warning",
    "error",
    "critical",
    "alert",
    "emergency",
];

/// Stored client capabilities after negotiation.
#[derive(Debug, Clone, Default)]
pub struct NegotiatedCapabilities {
    pub client: ClientCapabilities,
    pub initialized: bool,
    pub log_level: Option<String>,
}

impl NegotiatedCapabilities {
    pub fn negotiate(&mut self, params: InitializeParams) -> McpResult<InitializeResult> {
        if params.protocol_version != MCP_VERSION {
            tracing::warn!(
                "Client requested protocol version {}, server supports {}. Proceeding with server version.",
                params.protocol_version,
                MCP_VERSION
            );
        }

        self.client = params.capabilities;

        tracing::info!(
            "Initialized with client: {} v{}",
            params.client_info.name,
            params.client_info.version
        );

        Ok(InitializeResult::default_result())
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
        tracing::info!("MCP handshake complete");
    }

    pub fn set_log_level(&mut self, level: &str) -> McpResult<()> {
        let level = level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(McpError::InvalidParams(format!("Unknown log level: {level}")));
        }
        tracing::info!("Client log level set to {level}");
        self.log_level = Some(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Implementation;

    #[test]
    fn test_negotiate_with_other_version() {
        let mut caps = NegotiatedCapabilities::default();
        let result = caps
            .negotiate(InitializeParams {
                protocol_version: "2099-01-01".to_string(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: "client".to_string(),
                    version: "1".to_string(),
                },
            })
            .unwrap();
        assert_eq!(result.protocol_version, MCP_VERSION);
        assert!(!caps.initialized);
        caps.mark_initialized();
        assert!(caps.initialized);
    }

    #[test]
    fn test_log_levels() {
        let mut caps = NegotiatedCapabilities::default();
        caps.set_log_level("Warning").unwrap();
        assert_eq!(caps.log_level.as_deref(), Some("warning"));
        assert!(caps.set_log_level("verbose").is_err());
        assert_eq!(caps.log_level.as_deref(), Some("warning"));
    }
}
