//! Argument decoding for actions.
//!
//! Clients are loose about scalar types, so integers and booleans also accept
//! their string forms.

use binja_bridge::query::Params;
use binja_bridge::{is_int_like, Envelope, NO_FILE};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A rejection raised before any upstream call.
#[derive(thiserror::Error, Debug)]
pub enum ArgumentError {
    #[error("Invalid arguments: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{message}")]
    Invalid { message: String, context: Params },
}

impl ArgumentError {
    pub fn invalid(message: impl Into<String>, context: Params) -> Self {
        ArgumentError::Invalid {
            message: message.into(),
            context,
        }
    }

    /// Failed envelope for this rejection. No upstream call was made, so the
    /// active file is not looked up.
    pub fn into_envelope(self) -> Envelope {
        let message = self.to_string();
        let context = match self {
            ArgumentError::Decode(_) => Params::new(),
            ArgumentError::Invalid { context, .. } => context,
        };
        Envelope::failure(NO_FILE, message, &context)
    }
}

pub type ActionResult = Result<Envelope, ArgumentError>;

/// Decode the action arguments into `T`. A JSON `null` reads as `{}`.
pub fn decode<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ArgumentError> {
    let args = match args {
        Value::Null => Value::Object(Params::new()),
        other => other,
    };
    Ok(serde_json::from_value(args)?)
}

/// Route an identifier to `addr_key` when it reads as an integer, otherwise to
/// `name_key`. The identifier is trimmed first.
pub fn route_identifier(params: &mut Params, ident: &str, addr_key: &str, name_key: &str) {
    let ident = ident.trim();
    let key = if is_int_like(ident) { addr_key } else { name_key };
    params.insert(key.to_string(), Value::String(ident.to_string()));
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

/// `i64` from a number or a numeric string.
pub fn loose_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    use serde::de::Error;
    match LooseInt::deserialize(de)? {
        LooseInt::Int(n) => Ok(n),
        // `i64::MIN as f64` is exact; `i64::MAX as f64` rounds up to 2^63.
        LooseInt::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        LooseInt::Float(f) => Err(D::Error::custom(format!("expected an integer, got {f}"))),
        LooseInt::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected an integer, got {s:?}"))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseBool {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// `bool` from a boolean, a number, or a string. Strings other than
/// `false`/`0`/`no` (any case) are true.
pub fn loose_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(match LooseBool::deserialize(de)? {
        LooseBool::Bool(b) => b,
        LooseBool::Int(n) => n != 0,
        LooseBool::Text(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
    })
}

pub fn default_offset() -> i64 {
    0
}

pub fn default_limit() -> i64 {
    100
}

pub fn default_type_count() -> i64 {
    200
}

pub fn default_length() -> i64 {
    -1
}

pub fn default_true() -> bool {
    true
}
