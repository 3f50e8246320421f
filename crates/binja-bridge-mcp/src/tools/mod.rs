//! MCP tool implementations, one module per action family.

pub mod args;
pub mod binaries;
pub mod code;
pub mod comments;
pub mod context;
pub mod data;
pub mod listing;
pub mod registry;
pub mod symbols;
pub mod type_defs;
pub mod xrefs;

pub use args::{ActionResult, ArgumentError};
pub use context::ActionContext;
pub use registry::{Action, ActionRegistry, Param};
