//! Cross-reference queries.

use serde::Deserialize;
use serde_json::{json, Value};

use binja_bridge::query::params;
use binja_bridge::Timeout;

use super::args::{decode, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "get_xrefs_to",
        description: "Get all cross references (code and data) to an address.",
        params: &[Param::text("address", "Target address")],
        handler: get_xrefs_to,
    },
    Action {
        name: "get_xrefs_to_field",
        description: "Get cross references to a named struct field (member).",
        params: &[
            Param::text("struct_name", "Struct name"),
            Param::text("field_name", "Field name"),
        ],
        handler: get_xrefs_to_field,
    },
    Action {
        name: "get_xrefs_to_struct",
        description: "Get cross references/usages related to a struct name.",
        params: &[Param::text("struct_name", "Struct name")],
        handler: get_xrefs_to_struct,
    },
    Action {
        name: "get_xrefs_to_type",
        description: "Get xrefs/usages related to a struct or type name.",
        params: &[Param::text("type_name", "Type name")],
        handler: get_xrefs_to_type,
    },
    Action {
        name: "get_xrefs_to_enum",
        description: "Get usages/xrefs of an enum by scanning for member values and matches.",
        params: &[Param::text("enum_name", "Enum name")],
        handler: get_xrefs_to_enum,
    },
    Action {
        name: "get_xrefs_to_union",
        description: "Get cross references/usages related to a union type by name.",
        params: &[Param::text("union_name", "Union name")],
        handler: get_xrefs_to_union,
    },
];

#[derive(Debug, Deserialize)]
struct AddressArgs {
    address: String,
}

#[derive(Debug, Deserialize)]
struct FieldArgs {
    struct_name: String,
    field_name: String,
}

/// Single named argument; the alias matches the action's declared parameter.
#[derive(Debug, Deserialize)]
struct NamedArgs {
    #[serde(alias = "struct_name", alias = "type_name", alias = "enum_name", alias = "union_name")]
    name: String,
}

fn get_xrefs_to(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: AddressArgs = decode(args)?;
    Ok(ctx.get_envelope("getXrefsTo", params(json!({"address": args.address})), Timeout::Default))
}

fn get_xrefs_to_field(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: FieldArgs = decode(args)?;
    let query = params(json!({"struct": args.struct_name, "field": args.field_name}));
    Ok(ctx.get_envelope("getXrefsToField", query, Timeout::Default))
}

fn by_name(ctx: &ActionContext, endpoint: &str, args: Value) -> ActionResult {
    let args: NamedArgs = decode(args)?;
    Ok(ctx.get_envelope(endpoint, params(json!({"name": args.name})), Timeout::Default))
}

fn get_xrefs_to_struct(ctx: &ActionContext, args: Value) -> ActionResult {
    by_name(ctx, "getXrefsToStruct", args)
}

fn get_xrefs_to_type(ctx: &ActionContext, args: Value) -> ActionResult {
    by_name(ctx, "getXrefsToType", args)
}

fn get_xrefs_to_enum(ctx: &ActionContext, args: Value) -> ActionResult {
    by_name(ctx, "getXrefsToEnum", args)
}

fn get_xrefs_to_union(ctx: &ActionContext, args: Value) -> ActionResult {
    by_name(ctx, "getXrefsToUnion", args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binja_bridge::testing::{query_of, test_transport, RoutedBackend};
    use binja_bridge::Envelope;
    use std::sync::Arc;

    fn run(name: &str, backend: Arc<RoutedBackend>, args: Value) -> Envelope {
        let ctx = ActionContext::new(test_transport(backend));
        let action = ACTIONS.iter().find(|a| a.name == name).unwrap();
        action.invoke(&ctx, args)
    }

    #[test]
    fn test_xrefs_to_address() {
        let backend = RoutedBackend::new()
            .route("status", 200, r#"{"filename": "a.bin"}"#)
            .route("getXrefsTo", 200, r#"{"code": [{"from": "0x20"}], "data": []}"#);
        let env = run("get_xrefs_to", backend, json!({"address": "0x10"}));
        assert_eq!(
            env.to_value(),
            json!({"ok": true, "file": "a.bin", "code": [{"from": "0x20"}], "data": []})
        );
    }

    #[test]
    fn test_xrefs_to_field_query() {
        let backend = RoutedBackend::new().route("getXrefsToField", 200, r#"{"refs": []}"#);
        run(
            "get_xrefs_to_field",
            backend.clone(),
            json!({"struct_name": "pkt", "field_name": "len"}),
        );
        let mut q = query_of(&backend.requests_to("getXrefsToField")[0].url);
        q.sort();
        assert_eq!(
            q,
            vec![
                ("field".to_string(), "len".to_string()),
                ("struct".to_string(), "pkt".to_string()),
            ]
        );
    }

    #[test]
    fn test_named_xrefs_use_declared_parameter() {
        let cases = [
            ("get_xrefs_to_struct", "struct_name", "getXrefsToStruct"),
            ("get_xrefs_to_type", "type_name", "getXrefsToType"),
            ("get_xrefs_to_enum", "enum_name", "getXrefsToEnum"),
            ("get_xrefs_to_union", "union_name", "getXrefsToUnion"),
        ];
        for (action, param, endpoint) in cases {
            let backend = RoutedBackend::new().route(endpoint, 200, r#"{"refs": []}"#);
            let env = run(action, backend.clone(), json!({ param: "thing" }));
            assert!(env.ok, "{action}");
            let q = query_of(&backend.requests_to(endpoint)[0].url);
            assert_eq!(q, vec![("name".to_string(), "thing".to_string())], "{action}");
        }
    }

    #[test]
    fn test_named_xrefs_not_found() {
        let backend = RoutedBackend::new().route("getXrefsToEnum", 404, r#"{"error": "Enum not found"}"#);
        let env = run("get_xrefs_to_enum", backend, json!({"enum_name": "color"}));
        assert!(!env.ok);
        assert_eq!(env.request(), Some(&json!({"name": "color"})));
    }
}
