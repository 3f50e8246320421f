//! Action registration and dispatch.
//!
//! Actions are blocking functions. Each call takes a permit from a bounded
//! pool and runs on a blocking worker thread. If the awaiting caller goes
//! away the worker still runs to completion and its result is dropped.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;

use binja_bridge::config::worker_count;
use binja_bridge::Envelope;

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::args::ActionResult;
use super::context::ActionContext;
use super::{binaries, code, comments, data, listing, symbols, type_defs, xrefs};

pub type ActionHandler = fn(&ActionContext, Value) -> ActionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
}

impl ParamKind {
    fn schema_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Int(i64),
    Bool(bool),
    Str(&'static str),
}

impl ParamDefault {
    fn to_value(self) -> Value {
        match self {
            ParamDefault::Int(n) => Value::from(n),
            ParamDefault::Bool(b) => Value::Bool(b),
            ParamDefault::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// One declared action argument.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<ParamDefault>,
    pub description: &'static str,
}

impl Param {
    /// Required string.
    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            default: None,
            description,
        }
    }

    pub const fn text_or(
        name: &'static str,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            default: Some(ParamDefault::Str(default)),
            description,
        }
    }

    pub const fn int_or(name: &'static str, default: i64, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            default: Some(ParamDefault::Int(default)),
            description,
        }
    }

    pub const fn bool_or(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Boolean,
            default: Some(ParamDefault::Bool(default)),
            description,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.kind.schema_type()));
        if !self.description.is_empty() {
            schema.insert("description".to_string(), json!(self.description));
        }
        if let Some(default) = self.default {
            schema.insert("default".to_string(), default.to_value());
        }
        Value::Object(schema)
    }
}

/// A registered action.
pub struct Action {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
    pub handler: ActionHandler,
}

impl Action {
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name)
            .collect();

        let mut schema = json!({ "type": "object", "properties": properties });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: self.input_schema(),
        }
    }

    /// Run the handler on the current thread.
    pub fn invoke(&self, ctx: &ActionContext, args: Value) -> Envelope {
        (self.handler)(ctx, args).unwrap_or_else(|rejection| {
            tracing::debug!("{} rejected its arguments: {rejection}", self.name);
            rejection.into_envelope()
        })
    }
}

/// Every action family, in listing order.
const FAMILIES: &[&[Action]] = &[
    listing::ACTIONS,
    code::ACTIONS,
    data::ACTIONS,
    symbols::ACTIONS,
    comments::ACTIONS,
    type_defs::ACTIONS,
    xrefs::ACTIONS,
    binaries::ACTIONS,
];

pub struct ActionRegistry {
    context: Arc<ActionContext>,
    permits: Arc<Semaphore>,
}

impl ActionRegistry {
    /// Registry with a worker pool sized from the environment.
    pub fn new(context: ActionContext) -> Self {
        Self::with_workers(context, worker_count())
    }

    pub fn with_workers(context: ActionContext, workers: usize) -> Self {
        tracing::debug!("Action worker pool: {workers} threads");
        Self {
            context: Arc::new(context),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn context(&self) -> &ActionContext {
        &self.context
    }

    pub fn actions() -> impl Iterator<Item = &'static Action> {
        FAMILIES.iter().flat_map(|family| family.iter())
    }

    pub fn find(name: &str) -> Option<&'static Action> {
        Self::actions().find(|a| a.name == name)
    }

    pub fn list_tools() -> Vec<ToolDefinition> {
        Self::actions().map(Action::definition).collect()
    }

    /// Run an action and return its envelope.
    pub async fn call_envelope(&self, name: &str, arguments: Option<Value>) -> McpResult<Envelope> {
        let action = Self::find(name).ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        let args = arguments.unwrap_or(Value::Object(Map::new()));

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| McpError::InternalError(e.to_string()))?;
        let context = self.context.clone();

        tracing::debug!("Calling action {name}");
        let envelope = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            action.invoke(&context, args)
        })
        .await?;

        if !envelope.ok {
            tracing::debug!(
                "Action {name} failed: {}",
                envelope.error().unwrap_or("no error text")
            );
        }
        Ok(envelope)
    }

    pub async fn call(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResult> {
        let envelope = self.call_envelope(name, arguments).await?;
        Ok(ToolCallResult::json(&envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use binja_bridge::testing::{test_transport, RoutedBackend};

    #[test]
    fn test_catalogue_is_complete_and_unique() {
        let names: Vec<&str> = ActionRegistry::actions().map(|a| a.name).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), 54);
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_schema_marks_required() {
        let action = ActionRegistry::find("hexdump_address").unwrap();
        let schema = action.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["address"]));
        assert_eq!(schema["properties"]["length"]["default"], -1);
        assert_eq!(schema["properties"]["length"]["type"], "integer");
    }

    #[test]
    fn test_schema_without_required() {
        let schema = ActionRegistry::find("list_methods").unwrap().input_schema();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"]["limit"]["default"], 100);
    }

    #[test]
    fn test_every_action_has_description() {
        for action in ActionRegistry::actions() {
            assert!(!action.description.is_empty(), "{}", action.name);
        }
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let ctx = ActionContext::new(test_transport(RoutedBackend::new()));
        let registry = ActionRegistry::with_workers(ctx, 2);
        let err = registry.call_envelope("nope", None).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(ref n) if n == "nope"));
    }

    #[tokio::test]
    async fn test_call_runs_on_worker() {
        let backend = RoutedBackend::new().route("platforms", 200, r#"{"platforms": ["linux-x86_64"]}"#);
        let ctx = ActionContext::new(test_transport(backend));
        let registry = ActionRegistry::with_workers(ctx, 1);

        let result = registry.call("list_platforms", None).await.unwrap();
        let text = result.first_text().unwrap();
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "file": "(none)", "platforms": ["linux-x86_64"]})
        );
    }

    #[tokio::test]
    async fn test_bad_arguments_become_envelope() {
        let backend = RoutedBackend::new();
        let ctx = ActionContext::new(test_transport(backend.clone()));
        let registry = ActionRegistry::with_workers(ctx, 1);

        let env = registry
            .call_envelope("list_methods", Some(json!({"offset": "ten"})))
            .await
            .unwrap();
        assert!(!env.ok);
        assert_eq!(env.file, "(none)");
        assert!(backend.requests().is_empty());
    }
}
