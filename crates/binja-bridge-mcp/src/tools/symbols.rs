//! Renaming and retyping of functions, data and local variables.

use serde::Deserialize;
use serde_json::{json, Value};

use binja_bridge::query::{params, Params};
use binja_bridge::Timeout;

use super::args::{decode, route_identifier, ActionResult, ArgumentError};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "rename_function",
        description: "Rename a function by its current name (or address) to a new user-defined name.",
        params: &[
            Param::text("old_name", "Current function name or address"),
            Param::text("new_name", "New function name"),
        ],
        handler: rename_function,
    },
    Action {
        name: "rename_data",
        description: "Rename a data label at the specified address.",
        params: &[
            Param::text("address", "Data address"),
            Param::text("new_name", "New label"),
        ],
        handler: rename_data,
    },
    Action {
        name: "rename_single_variable",
        description: "Rename a variable in a function.",
        params: &[
            Param::text("function_name", "Function containing the variable"),
            Param::text("variable_name", "Current variable name"),
            Param::text("new_name", "New variable name"),
        ],
        handler: rename_single_variable,
    },
    Action {
        name: "rename_multi_variables",
        description: "Rename multiple local variables in one call. Provide mapping_json \
            (JSON object old->new), renames_json (JSON array of {old,new}), or pairs \
            (\"old1:new1,old2:new2\").",
        params: &[
            Param::text("function_identifier", "Function name or address"),
            Param::text_or("mapping_json", "", "JSON object mapping old names to new names"),
            Param::text_or("pairs", "", "Comma separated old:new pairs"),
            Param::text_or("renames_json", "", "JSON array of {\"old\", \"new\"} objects"),
        ],
        handler: rename_multi_variables,
    },
    Action {
        name: "retype_variable",
        description: "Retype a variable in a function.",
        params: &[
            Param::text("function_name", "Function containing the variable"),
            Param::text("variable_name", "Variable name"),
            Param::text("type_str", "New C type"),
        ],
        handler: retype_variable,
    },
    Action {
        name: "set_local_variable_type",
        description: "Set a local variable's type.",
        params: &[
            Param::text("function_address", "Function address"),
            Param::text("variable_name", "Variable name"),
            Param::text("new_type", "New C type"),
        ],
        handler: set_local_variable_type,
    },
];

#[derive(Debug, Deserialize)]
struct RenameFunctionArgs {
    old_name: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct RenameDataArgs {
    address: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct RenameVariableArgs {
    function_name: String,
    variable_name: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct RenameManyArgs {
    function_identifier: String,
    #[serde(default)]
    mapping_json: String,
    #[serde(default)]
    pairs: String,
    #[serde(default)]
    renames_json: String,
}

#[derive(Debug, Deserialize)]
struct RetypeArgs {
    function_name: String,
    variable_name: String,
    type_str: String,
}

#[derive(Debug, Deserialize)]
struct LocalTypeArgs {
    function_address: String,
    variable_name: String,
    new_type: String,
}

fn rename_function(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: RenameFunctionArgs = decode(args)?;
    let form = params(json!({"oldName": args.old_name, "newName": args.new_name}));
    Ok(ctx.post_envelope("renameFunction", form, Timeout::Default))
}

fn rename_data(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: RenameDataArgs = decode(args)?;
    let form = params(json!({"address": args.address, "newName": args.new_name}));
    Ok(ctx.post_envelope("renameData", form, Timeout::Default))
}

fn rename_single_variable(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: RenameVariableArgs = decode(args)?;
    let query = params(json!({
        "functionName": args.function_name,
        "variableName": args.variable_name,
        "newName": args.new_name,
    }));
    Ok(ctx.get_envelope("renameVariable", query, Timeout::Default))
}

/// The first non-empty of `renames_json`, `mapping_json` and `pairs` wins.
/// JSON inputs are checked here and forwarded as the original text.
fn rename_multi_variables(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: RenameManyArgs = decode(args)?;

    let mut form = Params::new();
    route_identifier(&mut form, &args.function_identifier, "address", "functionName");

    if !args.renames_json.is_empty() {
        ensure_json(&args.renames_json, "renames_json", &form)?;
        form.insert("renames".into(), args.renames_json.into());
    } else if !args.mapping_json.is_empty() {
        ensure_json(&args.mapping_json, "mapping_json", &form)?;
        form.insert("mapping".into(), args.mapping_json.into());
    } else if !args.pairs.is_empty() {
        form.insert("pairs".into(), args.pairs.into());
    } else {
        return Err(ArgumentError::invalid(
            "Provide mapping_json, renames_json, or pairs",
            form,
        ));
    }

    Ok(ctx.post_envelope("renameVariables", form, Timeout::Default))
}

fn ensure_json(text: &str, field: &str, context: &Params) -> Result<(), ArgumentError> {
    match serde_json::from_str::<Value>(text) {
        Ok(_) => Ok(()),
        Err(_) => Err(ArgumentError::invalid(
            format!("{field} is not valid JSON"),
            context.clone(),
        )),
    }
}

fn retype_variable(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: RetypeArgs = decode(args)?;
    let query = params(json!({
        "functionName": args.function_name,
        "variableName": args.variable_name,
        "type": args.type_str,
    }));
    Ok(ctx.get_envelope("retypeVariable", query, Timeout::Default))
}

fn set_local_variable_type(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: LocalTypeArgs = decode(args)?;
    let query = params(json!({
        "functionAddress": args.function_address,
        "variableName": args.variable_name,
        "newType": args.new_type,
    }));
    Ok(ctx.get_envelope("setLocalVariableType", query, Timeout::Long))
}

#[cfg(test)]
mod tests {
    use super::*;
    use binja_bridge::testing::{query_of, test_transport, RoutedBackend};
    use binja_bridge::{Envelope, HttpMethod, PostBody};
    use std::sync::Arc;

    fn run(name: &str, backend: Arc<RoutedBackend>, args: Value) -> Envelope {
        let ctx = ActionContext::new(test_transport(backend));
        let action = ACTIONS.iter().find(|a| a.name == name).unwrap();
        action.invoke(&ctx, args)
    }

    fn with_status() -> Arc<RoutedBackend> {
        RoutedBackend::new().route("status", 200, r#"{"filename": "a.bin"}"#)
    }

    fn posted_form(backend: &RoutedBackend, endpoint: &str) -> Params {
        let req = &backend.requests_to(endpoint)[0];
        assert_eq!(req.method, HttpMethod::Post);
        match &req.body {
            Some(PostBody::Form(form)) => form.clone(),
            other => panic!("expected a form body, got {other:?}"),
        }
    }

    #[test]
    fn test_rename_function_posts_camel_case() {
        let backend = with_status().route("renameFunction", 200, r#"{"success": true}"#);
        let env = run(
            "rename_function",
            backend.clone(),
            json!({"old_name": "sub_401000", "new_name": "parse_header"}),
        );
        assert_eq!(env.to_value(), json!({"ok": true, "file": "a.bin", "success": true}));
        assert_eq!(
            Value::Object(posted_form(&backend, "renameFunction")),
            json!({"oldName": "sub_401000", "newName": "parse_header"})
        );
    }

    #[test]
    fn test_rename_variable_uses_get() {
        let backend = with_status().route("renameVariable", 404, r#"{"error": "Variable not found"}"#);
        let env = run(
            "rename_single_variable",
            backend.clone(),
            json!({"function_name": "main", "variable_name": "var_8", "new_name": "len"}),
        );
        assert!(!env.ok);
        assert_eq!(env.error(), Some("Variable not found"));
        let q = query_of(&backend.requests_to("renameVariable")[0].url);
        assert!(q.contains(&("newName".to_string(), "len".to_string())));
    }

    #[test]
    fn test_rename_multi_prefers_renames_json() {
        let backend = with_status().route("renameVariables", 200, r#"{"renamed": 2}"#);
        run(
            "rename_multi_variables",
            backend.clone(),
            json!({
                "function_identifier": "0x401000",
                "renames_json": "[{\"old\": \"a\", \"new\": \"b\"}]",
                "mapping_json": "{\"x\": \"y\"}",
                "pairs": "c:d",
            }),
        );
        let form = posted_form(&backend, "renameVariables");
        assert_eq!(form.get("address"), Some(&json!("0x401000")));
        assert!(form.contains_key("renames"));
        assert!(!form.contains_key("mapping"));
        assert!(!form.contains_key("pairs"));
    }

    #[test]
    fn test_rename_multi_pairs_by_name() {
        let backend = with_status().route("renameVariables", 200, r#"{"renamed": 1}"#);
        run(
            "rename_multi_variables",
            backend.clone(),
            json!({"function_identifier": "main", "pairs": "a:b"}),
        );
        assert_eq!(
            Value::Object(posted_form(&backend, "renameVariables")),
            json!({"functionName": "main", "pairs": "a:b"})
        );
    }

    #[test]
    fn test_rename_multi_rejects_bad_json() {
        let backend = with_status();
        let env = run(
            "rename_multi_variables",
            backend.clone(),
            json!({"function_identifier": "main", "mapping_json": "{not json"}),
        );
        assert!(!env.ok);
        assert_eq!(env.file, "(none)");
        assert_eq!(env.error(), Some("mapping_json is not valid JSON"));
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_rename_multi_requires_input() {
        let backend = with_status();
        let env = run("rename_multi_variables", backend.clone(), json!({"function_identifier": "main"}));
        assert_eq!(env.error(), Some("Provide mapping_json, renames_json, or pairs"));
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_set_local_variable_type_query() {
        let backend = with_status().route("setLocalVariableType", 200, r#"{"success": true}"#);
        run(
            "set_local_variable_type",
            backend.clone(),
            json!({"function_address": "0x10", "variable_name": "v", "new_type": "uint32_t"}),
        );
        let mut q = query_of(&backend.requests_to("setLocalVariableType")[0].url);
        q.sort();
        assert_eq!(
            q,
            vec![
                ("functionAddress".to_string(), "0x10".to_string()),
                ("newType".to_string(), "uint32_t".to_string()),
                ("variableName".to_string(), "v".to_string()),
            ]
        );
    }
}
