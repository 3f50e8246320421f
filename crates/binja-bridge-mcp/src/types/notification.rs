//! MCP notification types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledParams {
    #[serde(rename = "requestId")]
    pub request_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelledParams {
    /// Parse cancellation params, accepting the legacy `{"id": ..}` shape.
    pub fn from_params(params: Option<&Value>) -> Option<Self> {
        let params = params?;
        if let Ok(parsed) = serde_json::from_value::<CancelledParams>(params.clone()) {
            return Some(parsed);
        }
        params.get("id").map(|id| CancelledParams {
            request_id: id.clone(),
            reason: None,
        })
    }
}
