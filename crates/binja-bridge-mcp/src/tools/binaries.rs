//! Binary selection. These actions describe the upstream itself rather than
//! one file, so they always report `(none)`.

use serde::Deserialize;
use serde_json::{json, Value};

use binja_bridge::query::{params, Params};
use binja_bridge::{Timeout, NO_FILE};

use super::args::{decode, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "get_binary_status",
        description: "Get the current status of the loaded binary.",
        params: &[],
        handler: get_binary_status,
    },
    Action {
        name: "list_binaries",
        description: "List managed/open binaries known to the server with ids and active flag.",
        params: &[],
        handler: list_binaries,
    },
    Action {
        name: "select_binary",
        description: "Select which binary to analyze by id, filename, or basename.",
        params: &[Param::text("view", "Binary id, filename or basename")],
        handler: select_binary,
    },
];

#[derive(Debug, Deserialize)]
struct SelectArgs {
    view: String,
}

fn get_binary_status(ctx: &ActionContext, _args: Value) -> ActionResult {
    let none = Params::new();
    Ok(ctx.get_envelope_for(NO_FILE.to_string(), "status", &none, &none, Timeout::Status))
}

fn list_binaries(ctx: &ActionContext, _args: Value) -> ActionResult {
    let none = Params::new();
    Ok(ctx.get_envelope_for(NO_FILE.to_string(), "binaries", &none, &none, Timeout::Status))
}

fn select_binary(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SelectArgs = decode(args)?;
    let query = params(json!({"view": args.view}));
    Ok(ctx.get_envelope_for(NO_FILE.to_string(), "selectBinary", &query, &query, Timeout::Long))
}

#[cfg(test)]
mod tests {
    use super::*;
    use binja_bridge::testing::{test_transport, RoutedBackend};
    use binja_bridge::Envelope;
    use std::sync::Arc;

    fn run(name: &str, backend: Arc<RoutedBackend>, args: Value) -> Envelope {
        let ctx = ActionContext::new(test_transport(backend));
        let action = ACTIONS.iter().find(|a| a.name == name).unwrap();
        action.invoke(&ctx, args)
    }

    #[test]
    fn test_status_is_single_request() {
        let backend = RoutedBackend::new().route(
            "status",
            200,
            r#"{"loaded": true, "filename": "/tmp/a.bin"}"#,
        );
        let env = run("get_binary_status", backend.clone(), json!({}));
        assert_eq!(
            env.to_value(),
            json!({"ok": true, "file": "(none)", "loaded": true, "filename": "/tmp/a.bin"})
        );
        assert_eq!(backend.requests().len(), 1);
    }

    #[test]
    fn test_list_binaries() {
        let backend = RoutedBackend::new().route(
            "binaries",
            200,
            r#"{"binaries": [{"id": "1", "active": true}]}"#,
        );
        let env = run("list_binaries", backend, Value::Null);
        assert!(env.ok);
        assert_eq!(env.get("binaries"), Some(&json!([{"id": "1", "active": true}])));
    }

    #[test]
    fn test_select_binary_failure_context() {
        let backend = RoutedBackend::new().route("selectBinary", 404, r#"{"error": "No such view"}"#);
        let env = run("select_binary", backend, json!({"view": "b.bin"}));
        assert_eq!(env.file, "(none)");
        assert_eq!(env.error(), Some("No such view"));
        assert_eq!(env.request(), Some(&json!({"view": "b.bin"})));
    }

    #[test]
    fn test_status_unreachable() {
        let backend = RoutedBackend::new().fail("status", "connection refused");
        let env = run("get_binary_status", backend, Value::Null);
        assert!(!env.ok);
        assert!(env.error().unwrap().starts_with("Request failed"));
    }
}
