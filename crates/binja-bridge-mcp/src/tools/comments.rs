//! Address and function comments.
//!
//! The upstream has no DELETE route; deletes are a POST carrying
//! `_method=DELETE`.

use serde::Deserialize;
use serde_json::{json, Value};

use binja_bridge::query::params;
use binja_bridge::Timeout;

use super::args::{decode, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "set_comment",
        description: "Set a comment at a specific address.",
        params: &[
            Param::text("address", "Address to annotate"),
            Param::text("comment", "Comment text"),
        ],
        handler: set_comment,
    },
    Action {
        name: "get_comment",
        description: "Get the comment at a specific address.",
        params: &[Param::text("address", "Address")],
        handler: get_comment,
    },
    Action {
        name: "delete_comment",
        description: "Delete the comment at a specific address.",
        params: &[Param::text("address", "Address")],
        handler: delete_comment,
    },
    Action {
        name: "set_function_comment",
        description: "Set a comment for a function.",
        params: &[
            Param::text("function_name", "Function name"),
            Param::text("comment", "Comment text"),
        ],
        handler: set_function_comment,
    },
    Action {
        name: "get_function_comment",
        description: "Get the comment for a function.",
        params: &[Param::text("function_name", "Function name")],
        handler: get_function_comment,
    },
    Action {
        name: "delete_function_comment",
        description: "Delete the comment for a function.",
        params: &[Param::text("function_name", "Function name")],
        handler: delete_function_comment,
    },
];

#[derive(Debug, Deserialize)]
struct AddressArgs {
    address: String,
}

#[derive(Debug, Deserialize)]
struct SetArgs {
    address: String,
    comment: String,
}

#[derive(Debug, Deserialize)]
struct FunctionArgs {
    function_name: String,
}

#[derive(Debug, Deserialize)]
struct SetFunctionArgs {
    function_name: String,
    comment: String,
}

fn set_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SetArgs = decode(args)?;
    let form = params(json!({"address": args.address, "comment": args.comment}));
    Ok(ctx.post_envelope("comment", form, Timeout::Default))
}

fn get_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: AddressArgs = decode(args)?;
    let query = params(json!({"address": args.address}));
    Ok(ctx.get_envelope("comment", query, Timeout::Default))
}

fn delete_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: AddressArgs = decode(args)?;
    let form = params(json!({"address": args.address, "_method": "DELETE"}));
    let context = params(json!({"address": args.address}));
    Ok(ctx.post_envelope_with("comment", form, &context, Timeout::Default))
}

fn set_function_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SetFunctionArgs = decode(args)?;
    let form = params(json!({"name": args.function_name, "comment": args.comment}));
    Ok(ctx.post_envelope("comment/function", form, Timeout::Default))
}

fn get_function_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: FunctionArgs = decode(args)?;
    let query = params(json!({"name": args.function_name}));
    Ok(ctx.get_envelope("comment/function", query, Timeout::Default))
}

fn delete_function_comment(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: FunctionArgs = decode(args)?;
    let form = params(json!({"name": args.function_name, "_method": "DELETE"}));
    let context = params(json!({"name": args.function_name}));
    Ok(ctx.post_envelope_with("comment/function", form, &context, Timeout::Default))
}
