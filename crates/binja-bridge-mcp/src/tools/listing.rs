//! Listing and search actions over the loaded binary.

use serde::Deserialize;
use serde_json::{Map, Value};

use binja_bridge::query::Params;
use binja_bridge::{fetch_paginated, Envelope, PageQuery, Timeout};

use super::args::{
    decode, default_limit, default_offset, default_type_count, loose_bool, loose_i64,
    ActionResult, ArgumentError,
};
use super::context::ActionContext;
use super::registry::{Action, Param};

const OFFSET: Param = Param::int_or("offset", 0, "Index of the first item");
const LIMIT: Param = Param::int_or("limit", 100, "Maximum number of items");
const COUNT: Param = Param::int_or("count", 100, "Maximum number of items");
const TYPE_COUNT: Param = Param::int_or("count", 200, "Maximum number of types");
const INCLUDE_LIBRARIES: Param =
    Param::bool_or("include_libraries", false, "Include types from type libraries");

pub const ACTIONS: &[Action] = &[
    Action {
        name: "list_methods",
        description: "List all function names in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_methods,
    },
    Action {
        name: "list_classes",
        description: "List all namespace/class names in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_classes,
    },
    Action {
        name: "list_segments",
        description: "List all memory segments in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_segments,
    },
    Action {
        name: "list_sections",
        description: "List sections in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_sections,
    },
    Action {
        name: "list_imports",
        description: "List imported symbols in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_imports,
    },
    Action {
        name: "list_exports",
        description: "List exported functions/symbols with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_exports,
    },
    Action {
        name: "list_namespaces",
        description: "List all non-global namespaces in the program with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_namespaces,
    },
    Action {
        name: "list_data_items",
        description: "List defined data labels and their values with pagination.",
        params: &[OFFSET, LIMIT],
        handler: list_data_items,
    },
    Action {
        name: "list_strings",
        description: "List strings in the database (paginated).",
        params: &[OFFSET, COUNT],
        handler: list_strings,
    },
    Action {
        name: "list_strings_filter",
        description: "List matching strings in the database (paginated, filtered).",
        params: &[
            OFFSET,
            COUNT,
            Param::text_or("filter", "", "Substring to match"),
        ],
        handler: list_strings_filter,
    },
    Action {
        name: "list_all_strings",
        description: "List all strings in the database (no pagination).",
        params: &[],
        handler: list_all_strings,
    },
    Action {
        name: "list_local_types",
        description: "List local types in the database (paginated).",
        params: &[OFFSET, TYPE_COUNT, INCLUDE_LIBRARIES],
        handler: list_local_types,
    },
    Action {
        name: "search_types",
        description: "Search local types whose name or declaration contains the substring.",
        params: &[
            Param::text("query", "Substring to search for"),
            OFFSET,
            TYPE_COUNT,
            INCLUDE_LIBRARIES,
        ],
        handler: search_types,
    },
    Action {
        name: "search_functions_by_name",
        description: "Search for functions whose name contains the given substring.",
        params: &[Param::text("query", "Substring to search for"), OFFSET, LIMIT],
        handler: search_functions_by_name,
    },
    Action {
        name: "get_entry_points",
        description: "List entry point(s) of the loaded binary.",
        params: &[],
        handler: get_entry_points,
    },
];

#[derive(Debug, Deserialize)]
struct PageArgs {
    #[serde(default = "default_offset", deserialize_with = "loose_i64")]
    offset: i64,
    #[serde(default = "default_limit", deserialize_with = "loose_i64")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct CountArgs {
    #[serde(default = "default_offset", deserialize_with = "loose_i64")]
    offset: i64,
    #[serde(default = "default_limit", deserialize_with = "loose_i64")]
    count: i64,
    #[serde(default)]
    filter: String,
}

#[derive(Debug, Deserialize)]
struct TypePageArgs {
    #[serde(default)]
    query: String,
    #[serde(default = "default_offset", deserialize_with = "loose_i64")]
    offset: i64,
    #[serde(default = "default_type_count", deserialize_with = "loose_i64")]
    count: i64,
    #[serde(default, deserialize_with = "loose_bool")]
    include_libraries: bool,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    query: String,
    #[serde(default = "default_offset", deserialize_with = "loose_i64")]
    offset: i64,
    #[serde(default = "default_limit", deserialize_with = "loose_i64")]
    limit: i64,
}

fn paged(ctx: &ActionContext, args: Value, endpoint: &str, result_key: &str) -> ActionResult {
    let args: PageArgs = decode(args)?;
    let file = ctx.active_file();
    let page = PageQuery::new(endpoint, file, args.offset, args.limit, result_key);
    Ok(fetch_paginated(ctx.transport(), &page))
}

fn list_methods(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "methods", "functions")
}

fn list_classes(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "classes", "classes")
}

fn list_segments(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "segments", "segments")
}

fn list_sections(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "sections", "sections")
}

fn list_imports(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "imports", "imports")
}

fn list_exports(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "exports", "exports")
}

fn list_namespaces(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "namespaces", "namespaces")
}

fn list_data_items(ctx: &ActionContext, args: Value) -> ActionResult {
    paged(ctx, args, "data", "data")
}

fn list_strings(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: CountArgs = decode(args)?;
    let file = ctx.active_file();
    let page =
        PageQuery::new("strings", file, args.offset, args.count, "strings").timeout(Timeout::Long);
    Ok(fetch_paginated(ctx.transport(), &page))
}

/// Array under `key`, with a missing or null value read as empty.
fn array_or_empty(data: &Map<String, Value>, key: &str) -> Value {
    match data.get(key) {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(items) => items.clone(),
    }
}

fn list_strings_filter(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: CountArgs = decode(args)?;
    let file = ctx.active_file();

    let mut query = Params::new();
    query.insert("offset".into(), args.offset.into());
    query.insert("limit".into(), args.count.into());
    query.insert("filter".into(), args.filter.clone().into());

    match ctx.transport().get_json("strings/filter", &query, Timeout::Long) {
        Some(Value::Object(data)) if !data.contains_key("error") => {
            let mut payload = Map::new();
            payload.insert("offset".into(), args.offset.into());
            payload.insert("limit".into(), args.count.into());
            payload.insert("filter".into(), args.filter.into());
            payload.insert("strings".into(), array_or_empty(&data, "strings"));
            payload.insert("total".into(), data.get("total").cloned().unwrap_or(Value::Null));
            Ok(Envelope::result(true, file, payload))
        }
        other => Ok(Envelope::from_json(other, file, &query)),
    }
}

fn list_all_strings(ctx: &ActionContext, _args: Value) -> ActionResult {
    let file = ctx.active_file();
    match ctx.transport().get_json("allStrings", &Params::new(), Timeout::Long) {
        Some(Value::Object(data)) if !data.contains_key("error") => {
            let mut payload = Map::new();
            payload.insert("strings".into(), array_or_empty(&data, "strings"));
            Ok(Envelope::result(true, file, payload))
        }
        other => Ok(Envelope::from_json(other, file, &Params::new())),
    }
}

fn list_local_types(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: TypePageArgs = decode(args)?;
    let file = ctx.active_file();
    let page = PageQuery::new("localTypes", file, args.offset, args.count, "types")
        .param("includeLibraries", i64::from(args.include_libraries))
        .extra("includeLibraries", args.include_libraries)
        .timeout(Timeout::Long);
    Ok(fetch_paginated(ctx.transport(), &page))
}

fn search_types(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: TypePageArgs = decode(args)?;
    let file = ctx.active_file();

    let mut query = Params::new();
    query.insert("query".into(), args.query.clone().into());
    query.insert("offset".into(), args.offset.into());
    query.insert("limit".into(), args.count.into());
    query.insert(
        "includeLibraries".into(),
        i64::from(args.include_libraries).into(),
    );

    match ctx.transport().get_json("searchTypes", &query, Timeout::Long) {
        Some(Value::Object(data)) if !data.contains_key("error") => {
            let mut payload = Map::new();
            payload.insert("query".into(), args.query.into());
            payload.insert("offset".into(), args.offset.into());
            payload.insert("limit".into(), args.count.into());
            payload.insert("includeLibraries".into(), args.include_libraries.into());
            payload.insert("types".into(), array_or_empty(&data, "types"));
            payload.insert("total".into(), data.get("total").cloned().unwrap_or(Value::Null));
            Ok(Envelope::result(true, file, payload))
        }
        other => Ok(Envelope::from_json(other, file, &query)),
    }
}

fn search_functions_by_name(ctx: &ActionContext, args: Value) -> ActionResult {
    let args: SearchArgs = decode(args)?;

    let mut query = Params::new();
    query.insert("query".into(), args.query.clone().into());
    if args.query.is_empty() {
        return Err(ArgumentError::invalid("Query string is required", query));
    }
    query.insert("offset".into(), args.offset.into());
    query.insert("limit".into(), args.limit.into());

    let file = ctx.active_file();
    match ctx.transport().get_json("searchFunctions", &query, Timeout::Default) {
        Some(Value::Object(data)) if !data.contains_key("error") => {
            let mut payload = Map::new();
            payload.insert("query".into(), args.query.into());
            payload.insert("offset".into(), args.offset.into());
            payload.insert("limit".into(), args.limit.into());
            payload.insert("matches".into(), array_or_empty(&data, "matches"));
            Ok(Envelope::result(true, file, payload))
        }
        other => Ok(Envelope::from_json(other, file, &query)),
    }
}

fn get_entry_points(ctx: &ActionContext, _args: Value) -> ActionResult {
    Ok(ctx.get_envelope("entryPoints", Params::new(), Timeout::Default))
}
