//! Raw data actions: hexdumps, declarations, value formatting, patching.

use serde::Deserialize;
use serde_json::Value;

use binja_bridge::query::Params;
use binja_bridge::{Envelope, Timeout, NO_FILE};

use super::args::{decode, default_length, default_true, loose_bool, loose_i64, ActionResult};
use super::context::ActionContext;
use super::registry::{Action, Param};

const LENGTH: Param = Param::int_or("length", -1, "Number of bytes; -1 for the whole item");
const SIZE: Param = Param::int_or("size", 0, "Value size in bytes; 0 to infer");

pub const ACTIONS: &[Action] = &[
    Action {
        name: "hexdump_address",
        description: "Hexdump data starting at an address.",
        params: &[Param::text("address", "Start address"), LENGTH],
        handler: hexdump_address,
    },
    Action {
        name: "hexdump_data",
        description: "Hexdump a data symbol by name or address.",
        params: &[Param::text("name_or_address", "Data symbol name or 0x address"), LENGTH],
        handler: hexdump_data,
    },
    Action {
        name: "get_data_decl",
        description: "Return a C-like declaration and a hexdump for a data symbol or address.",
        params: &[Param::text("name_or_address", "Data symbol name or 0x address"), LENGTH],
        handler: get_data_decl,
    },
    Action {
        name: "format_value",
        description: "Convert a value and annotate it at an address in the binary view.",
        params: &[
            Param::text("address", "Address to annotate"),
            Param::text("text", "Value to convert"),
            SIZE,
        ],
        handler: format_value,
    },
    Action {
        name: "convert_number",
        description: "Convert a number or string to its representations.",
        params: &[Param::text("text", "Number or string to convert"), SIZE],
        handler: convert_number,
    },
    Action {
        name: "patch_bytes",
        description: "Patch raw bytes at an address.",
        params: &[
            Param::text("address", "Address to patch"),
            Param::text("data", "Hex bytes, e.g. \"90 90\""),
            Param::bool_or("save_to_file", true, "Also write the patch to the file on disk"),
        ],
        handler: patch_bytes,
    },
];

#[derive(Debug, Deserialize)]
struct HexdumpArgs {
    address: String,
    #[serde(default = "default_length", deserialize_with = "loose_i64")]
    length: i64,
}

#[derive(Debug, Deserialize)]
struct SymbolArgs {
    name_or_address: String,
    #[serde(default = "default_length", deserialize_with = "loose_i64")]
    length: i64,
}

#[derive(Debug, Deserialize)]
struct FormatArgs {
    address: String,
    text: String,
    #[serde(default, deserialize_with = "loose_i64")]
    size: i64,
}

#[derive(Debug, Deserialize)]
struct ConvertArgs {
    text: String,
    #[serde(default, deserialize_with = "loose_i64")]
    size: i64,
}

#[derive(Debug, Deserialize)]
struct PatchArgs {
    address: String,
    data: String,
    #[serde(default = "default_true", deserialize_with = "loose_bool")]
    save_to_file: bool,
}

fn hexdump_at(ctx: &ActionContext, address: String, length: i64) -> Envelope {
    let mut params = Params::new();
    params.insert("address".into(), address.into());
    params.insert("length".into(), length.into());

    let file = ctx.active_file();
    let text = ctx.transport().get_text("hexdump", &params, Timeout::Long);
    Envelope::from_text(Some(&text), file, "hexdump", &params)
}

fn hexdump_address(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: HexdumpArgs = decode(args)?;
    Ok(hexdump_at(ctx, args.address, args.length))
}

fn hexdump_data(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SymbolArgs = decode(args)?;
    let ident = args.name_or_address.trim();
    if ident.starts_with("0x") {
        return Ok(hexdump_at(ctx, ident.to_string(), args.length));
    }

    let mut params = Params::new();
    params.insert("name".into(), ident.into());
    params.insert("length".into(), args.length.into());

    let file = ctx.active_file();
    let text = ctx.transport().get_text("hexdumpByName", &params, Timeout::Long);
    Ok(Envelope::from_text(Some(&text), file, "hexdump", &params))
}

fn get_data_decl(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SymbolArgs = decode(args)?;
    let ident = args.name_or_address.trim();

    let mut params = Params::new();
    let key = if ident.starts_with("0x") { "address" } else { "name" };
    params.insert(key.into(), ident.into());
    params.insert("length".into(), args.length.into());

    Ok(ctx.get_envelope("getDataDecl", params, Timeout::Long))
}

fn format_value(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: FormatArgs = decode(args)?;
    let mut params = Params::new();
    params.insert("address".into(), args.address.into());
    params.insert("text".into(), args.text.into());
    params.insert("size".into(), args.size.into());
    Ok(ctx.get_envelope("formatValue", params, Timeout::Long))
}

fn convert_number(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: ConvertArgs = decode(args)?;
    let mut params = Params::new();
    params.insert("text".into(), args.text.into());
    params.insert("size".into(), args.size.into());
    Ok(ctx.get_envelope_for(NO_FILE.to_string(), "convertNumber", &params, &params, Timeout::Long))
}

fn patch_bytes(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: PatchArgs = decode(args)?;
    let mut form = Params::new();
    form.insert("address".into(), args.address.into());
    form.insert("data".into(), args.data.into());
    form.insert("save_to_file".into(), args.save_to_file.into());
    Ok(ctx.post_envelope("patch", form, Timeout::Long))
}
