//! Main request dispatcher: receives JSON-RPC messages, routes to handlers.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::Value;

use crate::tools::ActionRegistry;
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::validator::validate_request;

/// The main protocol handler that dispatches incoming JSON-RPC messages.
pub struct ProtocolHandler {
    registry: Arc<ActionRegistry>,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default(),
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "shutdown" => self.handle_shutdown().await,

            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            "logging/setLevel" => self.handle_set_level(request.params.clone()).await,

            "ping" => Ok(Value::Object(serde_json::Map::new())),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | NOTIFICATION_INITIALIZED => {
                self.capabilities.lock().await.mark_initialized();
            }
            NOTIFICATION_CANCELLED | "$/cancelRequest" => {
                match CancelledParams::from_params(notification.params.as_ref()) {
                    Some(params) => tracing::info!(
                        "Client cancelled request {}{}",
                        params.request_id,
                        params
                            .reason
                            .map(|r| format!(": {r}"))
                            .unwrap_or_default()
                    ),
                    None => tracing::debug!("Cancellation notification without a request id"),
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Initialize params required".to_string()))?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params)?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!("Shutdown requested");
        Ok(Value::Object(serde_json::Map::new()))
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: ActionRegistry::list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Tool call params required".to_string()))?;

        let result = self
            .registry
            .call(&call_params.name, call_params.arguments)
            .await?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_set_level(&self, params: Option<Value>) -> McpResult<Value> {
        let level_params: SetLevelParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Level params required".to_string()))?;

        self.capabilities
            .lock()
            .await
            .set_log_level(&level_params.level)?;
        Ok(Value::Object(serde_json::Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ActionContext;
    use binja_bridge::testing::{test_transport, RoutedBackend};
    use serde_json::json;

    fn handler(backend: Arc<RoutedBackend>) -> ProtocolHandler {
        let ctx = ActionContext::new(test_transport(backend));
        ProtocolHandler::new(Arc::new(ActionRegistry::with_workers(ctx, 2)))
    }

    async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
        let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
        handler.handle_message(parsed).await
    }

    #[tokio::test]
    async fn test_initialize_reports_capabilities() {
        let h = handler(RoutedBackend::new());
        let resp = send(
            &h,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "t", "version": "0"}
                }
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp["result"]["serverInfo"]["name"], "binja-mcp");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
        assert!(resp["result"]["capabilities"]["logging"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_requires_params() {
        let h = handler(RoutedBackend::new());
        let resp = send(&h, json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_notifications_have_no_response() {
        let h = handler(RoutedBackend::new());
        for method in ["initialized", "notifications/initialized", "notifications/cancelled"] {
            let resp = send(
                &h,
                json!({"jsonrpc": "2.0", "method": method, "params": {"requestId": 4}}),
            )
            .await;
            assert!(resp.is_none(), "{method}");
        }
        assert!(h.capabilities.lock().await.initialized);
    }

    #[tokio::test]
    async fn test_set_level() {
        let h = handler(RoutedBackend::new());
        let ok = send(
            &h,
            json!({"jsonrpc": "2.0", "id": 3, "method": "logging/setLevel", "params": {"level": "debug"}}),
        )
        .await
        .unwrap();
        assert_eq!(ok["result"], json!({}));

        let bad = send(
            &h,
            json!({"jsonrpc": "2.0", "id": 4, "method": "logging/setLevel", "params": {"level": "loud"}}),
        )
        .await
        .unwrap();
        assert_eq!(bad["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_tools_call_wraps_envelope() {
        let backend = RoutedBackend::new()
            .route("status", 200, r#"{"filename": "a.bin"}"#)
            .route("functionAt", 200, r#"{"functions": ["main"]}"#);
        let h = handler(backend);
        let resp = send(
            &h,
            json!({
                "jsonrpc": "2.0",
                "id": "call-1",
                "method": "tools/call",
                "params": {"name": "function_at", "arguments": {"address": "0x10"}}
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp["id"], "call-1");
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(
            envelope,
            json!({"ok": true, "file": "a.bin", "functions": ["main"]})
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let h = handler(RoutedBackend::new());
        let resp = send(&h, json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32601);
    }
}
