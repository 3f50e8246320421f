//! Response envelopes: the single `{ok, file, ...}` shape every action returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::query::Params;
use crate::transport::Transport;

/// File reported when no active file is known.
pub const NO_FILE: &str = "(none)";

/// Error text used when the transport produced no body at all.
pub const NO_RESPONSE: &str = "No response from server";

/// Keys owned by the envelope. Upstream values for them are discarded.
const RESERVED_KEYS: [&str; 2] = ["ok", "file"];

/// Text prefixes the transport uses for its own synthesized failures.
const FAILURE_PREFIXES: [&str; 2] = ["Error ", "Request failed"];

/// Uniform action result. Serialises flat: `{"ok": .., "file": .., ..fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    pub file: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Build an envelope from an explicit verdict and payload.
    pub fn result(ok: bool, file: impl Into<String>, payload: Map<String, Value>) -> Self {
        let mut fields = payload;
        strip_reserved(&mut fields);
        Self {
            ok,
            file: file.into(),
            fields,
        }
    }

    /// Failed envelope with an `error` message, carrying the context under
    /// `request` when it is non-empty.
    pub fn failure(file: impl Into<String>, error: impl Into<String>, context: &Params) -> Self {
        let mut fields = Map::new();
        fields.insert("error".to_string(), Value::String(error.into()));
        attach_request(&mut fields, context);
        Self::result(false, file, fields)
    }

    /// Convert a JSON fetch result.
    ///
    /// A mapping with an `error` key fails. Otherwise a boolean `success` key
    /// decides, and anything else succeeds. Non-mappings succeed as
    /// `{raw: value}`. `None` fails with [`NO_RESPONSE`].
    pub fn from_json(data: Option<Value>, file: impl Into<String>, context: &Params) -> Self {
        match data {
            None => Self::failure(file, NO_RESPONSE, context),
            Some(Value::Object(mut fields)) => {
                let ok = success_of(&fields);
                strip_reserved(&mut fields);
                if !ok {
                    attach_request(&mut fields, context);
                }
                Self::result(ok, file, fields)
            }
            Some(other) => {
                let mut fields = Map::new();
                fields.insert("raw".to_string(), other);
                Self::result(true, file, fields)
            }
        }
    }

    /// Convert a text fetch result, storing the trimmed text under `key`.
    pub fn from_text(
        text: Option<&str>,
        file: impl Into<String>,
        key: &str,
        context: &Params,
    ) -> Self {
        let Some(text) = text else {
            return Self::failure(file, NO_RESPONSE, context);
        };
        let trimmed = text.trim();
        if FAILURE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            return Self::failure(file, trimmed, context);
        }
        Self::echoing(file, context, key, Value::String(trimmed.to_string()))
    }

    /// Convert a list fetch result, storing the items under `key`.
    pub fn from_list(
        items: Option<Vec<Value>>,
        file: impl Into<String>,
        key: &str,
        context: &Params,
    ) -> Self {
        match items {
            None => Self::failure(file, NO_RESPONSE, context),
            Some(items) => Self::echoing(file, context, key, Value::Array(items)),
        }
    }

    /// Successful envelope that repeats the context at the top level, with
    /// `key` taking precedence over a context field of the same name.
    fn echoing(file: impl Into<String>, context: &Params, key: &str, value: Value) -> Self {
        let mut fields = context.clone();
        fields.insert(key.to_string(), value);
        Self::result(true, file, fields)
    }

    /// Add or replace a payload field. Reserved keys are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn error(&self) -> Option<&str> {
        self.fields.get("error").and_then(Value::as_str)
    }

    pub fn request(&self) -> Option<&Value> {
        self.fields.get("request")
    }

    /// The flat JSON mapping handed to the protocol host.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("ok".to_string(), Value::Bool(self.ok));
        out.insert("file".to_string(), Value::String(self.file.clone()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }
}

fn success_of(fields: &Map<String, Value>) -> bool {
    if fields.contains_key("error") {
        return false;
    }
    match fields.get("success") {
        Some(Value::Bool(flag)) => *flag,
        _ => true,
    }
}

fn strip_reserved(fields: &mut Map<String, Value>) {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
}

fn attach_request(fields: &mut Map<String, Value>, context: &Params) {
    if !context.is_empty() {
        fields.insert("request".to_string(), Value::Object(context.clone()));
    }
}

/// Best-effort active file, falling back to [`NO_FILE`].
pub fn active_file(transport: &Transport) -> String {
    file_or_none(transport.active_filename())
}

pub fn file_or_none(file: Option<String>) -> String {
    file.filter(|f| !f.is_empty())
        .unwrap_or_else(|| NO_FILE.to_string())
}
