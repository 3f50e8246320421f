//! Function-level code actions: decompilation, IL, disassembly, prototypes.

use serde::Deserialize;
use serde_json::Value;

use binja_bridge::query::Params;
use binja_bridge::Timeout;

use super::args::{decode, loose_bool, route_identifier, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

pub const ACTIONS: &[Action] = &[
    Action {
        name: "decompile_function",
        description: "Decompile a specific function by name.",
        params: &[Param::text("name", "Function name")],
        handler: decompile_function,
    },
    Action {
        name: "get_il",
        description: "Get IL for a function in the selected view.",
        params: &[
            Param::text("name_or_address", "Function name or address"),
            Param::text_or("view", "hlil", "IL view: hlil, mlil or llil"),
            Param::bool_or("ssa", false, "Return the SSA form"),
        ],
        handler: get_il,
    },
    Action {
        name: "fetch_disassembly",
        description: "Retrieve disassembly for a function by name.",
        params: &[Param::text("name", "Function name")],
        handler: fetch_disassembly,
    },
    Action {
        name: "function_at",
        description: "Retrieve the name(s) of the function(s) containing an address.",
        params: &[Param::text("address", "Address inside the function")],
        handler: function_at,
    },
    Action {
        name: "get_stack_frame_vars",
        description: "Get stack frame variable information for a function by name or address.",
        params: &[Param::text("function_identifier", "Function name or address")],
        handler: get_stack_frame_vars,
    },
    Action {
        name: "make_function_at",
        description: "Create a function at the given address.",
        params: &[
            Param::text("address", "Start address of the new function"),
            Param::text_or("platform", "", "Platform name; empty uses the default"),
        ],
        handler: make_function_at,
    },
    Action {
        name: "set_function_prototype",
        description: "Set a function's prototype by name or address.",
        params: &[
            Param::text("name_or_address", "Function name or address"),
            Param::text("prototype", "C prototype, e.g. int main(int argc, char **argv)"),
        ],
        handler: set_function_prototype,
    },
];

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AddressArgs {
    address: String,
}

#[derive(Debug, Deserialize)]
struct IlArgs {
    name_or_address: String,
    #[serde(default = "default_view")]
    view: String,
    #[serde(default, deserialize_with = "loose_bool")]
    ssa: bool,
}

fn default_view() -> String {
    "hlil".to_string()
}

#[derive(Debug, Deserialize)]
struct FrameArgs {
    function_identifier: String,
}

#[derive(Debug, Deserialize)]
struct MakeFunctionArgs {
    address: String,
    #[serde(default)]
    platform: String,
}

#[derive(Debug, Deserialize)]
struct PrototypeArgs {
    name_or_address: String,
    prototype: String,
}

fn single(key: &str, value: String) -> Params {
    let mut params = Params::new();
    params.insert(key.to_string(), Value::String(value));
    params
}

fn decompile_function(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: NameArgs = decode(args)?;
    Ok(ctx.get_envelope("decompile", single("name", args.name), Timeout::Long))
}

fn get_il(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: IlArgs = decode(args)?;

    let mut query = Params::new();
    query.insert("view".into(), args.view.clone().into());
    query.insert("ssa".into(), i64::from(args.ssa).into());
    route_identifier(&mut query, &args.name_or_address, "address", "name");

    let mut context = Params::new();
    context.insert("requested".into(), args.name_or_address.into());
    context.insert("view".into(), args.view.into());
    context.insert("ssa".into(), args.ssa.into());

    let file = ctx.active_file();
    Ok(ctx.get_envelope_for(file, "il", &query, &context, Timeout::Long))
}

fn fetch_disassembly(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: NameArgs = decode(args)?;
    Ok(ctx.get_envelope("assembly", single("name", args.name), Timeout::Long))
}

fn function_at(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: AddressArgs = decode(args)?;
    Ok(ctx.get_envelope("functionAt", single("address", args.address), Timeout::Default))
}

fn get_stack_frame_vars(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: FrameArgs = decode(args)?;

    let mut query = Params::new();
    route_identifier(&mut query, &args.function_identifier, "address", "name");
    let context = single("identifier", args.function_identifier);

    let file = ctx.active_file();
    Ok(ctx.get_envelope_for(file, "getStackFrameVars", &query, &context, Timeout::Long))
}

fn make_function_at(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: MakeFunctionArgs = decode(args)?;
    let mut params = single("address", args.address);
    if !args.platform.is_empty() {
        params.insert("platform".into(), args.platform.into());
    }
    Ok(ctx.get_envelope("makeFunctionAt", params, Timeout::Long))
}

fn set_function_prototype(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: PrototypeArgs = decode(args)?;

    let mut form = single("prototype", args.prototype);
    route_identifier(&mut form, &args.name_or_address, "address", "name");
    let context = single("requested", args.name_or_address);

    Ok(ctx.post_envelope_with("setFunctionPrototype", form, &context, Timeout::Long))
}
