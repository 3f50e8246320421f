//! Type definition and lookup actions.

use serde::Deserialize;
use serde_json::{json, Value};

use binja_bridge::query::{params, Params};
use binja_bridge::{Envelope, PostBody, Timeout, NO_FILE};

use super::args::{decode, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "define_types",
        description: "Define types from a C code string.",
        params: &[Param::text("c_code", "C source with type definitions")],
        handler: define_types,
    },
    Action {
        name: "declare_c_type",
        description: "Create or update a local type from a C declaration.",
        params: &[Param::text("c_declaration", "A single C declaration")],
        handler: declare_c_type,
    },
    Action {
        name: "get_user_defined_type",
        description: "Retrieve a user-defined type definition (struct/enum/typedef/union).",
        params: &[Param::text("type_name", "Type name")],
        handler: get_user_defined_type,
    },
    Action {
        name: "get_type_info",
        description: "Resolve a type name and return its declaration and details.",
        params: &[Param::text("type_name", "Type name")],
        handler: get_type_info,
    },
    Action {
        name: "list_platforms",
        description: "List all available platform names from Binary Ninja.",
        params: &[],
        handler: list_platforms,
    },
];

#[derive(Debug, Deserialize)]
struct DefineArgs {
    c_code: String,
}

#[derive(Debug, Deserialize)]
struct DeclareArgs {
    c_declaration: String,
}

#[derive(Debug, Deserialize)]
struct TypeNameArgs {
    type_name: String,
}

/// POST reported without a request context.
fn post_bare(ctx: &ActionContext, endpoint: &str, form: Params, timeout: Timeout) -> Envelope {
    let file = ctx.active_file();
    let data = ctx.transport().post_json(endpoint, PostBody::Form(form), timeout);
    Envelope::from_json(data, file, &Params::new())
}

fn define_types(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: DefineArgs = decode(args)?;
    let form = params(json!({"cCode": args.c_code}));
    Ok(post_bare(ctx, "defineTypes", form, Timeout::Default))
}

fn declare_c_type(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: DeclareArgs = decode(args)?;
    let form = params(json!({"declaration": args.c_declaration}));
    Ok(post_bare(ctx, "declareCType", form, Timeout::Long))
}

fn get_user_defined_type(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: TypeNameArgs = decode(args)?;
    let query = params(json!({"name": args.type_name}));
    Ok(ctx.get_envelope("getUserDefinedType", query, Timeout::Default))
}

fn get_type_info(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: TypeNameArgs = decode(args)?;
    let query = params(json!({"name": args.type_name}));
    Ok(ctx.get_envelope("getTypeInfo", query, Timeout::Long))
}

fn list_platforms(ctx: &ActionContext, _args: Value) -> ActionResult {
    let none = Params::new();
    Ok(ctx.get_envelope_for(NO_FILE.to_string(), "platforms", &none, &none, Timeout::Status))
}
