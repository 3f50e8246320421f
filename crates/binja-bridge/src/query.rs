//! Form encoding for query strings and POST bodies.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Request parameters, keyed by upstream parameter name.
pub type Params = Map<String, Value>;

/// Turn a `json!({...})` literal into [`Params`]. Non-objects yield no params.
pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Percent-encode params as `application/x-www-form-urlencoded`.
///
/// Arrays expand into repeated keys, booleans render as `true`/`false`,
/// nulls are dropped and nested objects are sent as compact JSON.
pub fn encode_form(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        serializer.append_pair(key, &text);
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    serializer.append_pair(key, &text);
                }
            }
        }
    }
    serializer.finish()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

/// Join base URL, endpoint and encoded query.
pub fn build_url(base: &str, endpoint: &str, params: &Params) -> String {
    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    );
    let query = encode_form(params);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    url
}
