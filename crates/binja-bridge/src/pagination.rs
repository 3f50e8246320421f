//! Paginated listing helper shared by the listing actions.

use serde_json::{Map, Value};

use crate::envelope::Envelope;
use crate::query::Params;
use crate::transport::Transport;
use crate::types::Timeout;

/// One paginated listing request.
#[derive(Debug, Clone)]
pub struct PageQuery {
    pub endpoint: String,
    pub file: String,
    pub offset: i64,
    pub limit: i64,
    /// Key holding the result array in the upstream response.
    pub result_key: String,
    /// Extra query parameters merged after `offset`/`limit`.
    pub params: Params,
    pub timeout: Timeout,
    /// Fields added to successful envelopes.
    pub extra_payload: Map<String, Value>,
}

impl PageQuery {
    pub fn new(
        endpoint: impl Into<String>,
        file: impl Into<String>,
        offset: i64,
        limit: i64,
        result_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            file: file.into(),
            offset,
            limit,
            result_key: result_key.into(),
            params: Params::new(),
            timeout: Timeout::Default,
            extra_payload: Map::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_payload.insert(key.into(), value.into());
        self
    }

    /// Full query sent upstream: `offset`, `limit`, then the extra params.
    pub fn query(&self) -> Params {
        let mut query = Params::new();
        query.insert("offset".to_string(), Value::from(self.offset));
        query.insert("limit".to_string(), Value::from(self.limit));
        for (key, value) in &self.params {
            query.insert(key.clone(), value.clone());
        }
        query
    }
}

/// Fetch one page and unwrap the named array.
///
/// A successful mapping yields `{ok: true, offset, limit, <result_key>: [...]}`
/// with a missing or null array read as empty. Anything else goes through
/// [`Envelope::from_json`] with the full query as request context.
pub fn fetch_paginated(transport: &Transport, page: &PageQuery) -> Envelope {
    let query = page.query();
    let data = transport.get_json(&page.endpoint, &query, page.timeout);

    match data {
        Some(Value::Object(map)) if !map.contains_key("error") => {
            let items = match map.get(&page.result_key) {
                None | Some(Value::Null) => Value::Array(Vec::new()),
                Some(items) => items.clone(),
            };
            let mut payload = Map::new();
            payload.insert("offset".to_string(), Value::from(page.offset));
            payload.insert("limit".to_string(), Value::from(page.limit));
            payload.insert(page.result_key.clone(), items);
            for (key, value) in &page.extra_payload {
                payload.insert(key.clone(), value.clone());
            }
            Envelope::result(true, page.file.clone(), payload)
        }
        other => Envelope::from_json(other, page.file.clone(), &query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawResponse;
    use crate::testing::{test_transport as transport, ScriptedBackend};
    use serde_json::json;

    #[test]
    fn test_page_success() {
        let backend = ScriptedBackend::reply(200, r#"{"functions": ["main", "init"], "total": 2}"#);
        let page = PageQuery::new("methods", "a.bin", 0, 100, "functions");
        let env = fetch_paginated(&transport(backend.clone()), &page);
        assert_eq!(
            env.to_value(),
            json!({"ok": true, "file": "a.bin", "offset": 0, "limit": 100, "functions": ["main", "init"]})
        );
        let url = &backend.urls()[0];
        assert!(url.starts_with("http://bn.test:9009/methods?"));
        assert!(url.contains("offset=0") && url.contains("limit=100"));
    }

    #[test]
    fn test_page_missing_or_null_key_is_empty() {
        for body in [r#"{"other": 1}"#, r#"{"functions": null}"#] {
            let backend = ScriptedBackend::reply(200, body);
            let page = PageQuery::new("methods", "a.bin", 5, 10, "functions");
            let env = fetch_paginated(&transport(backend), &page);
            assert!(env.ok);
            assert_eq!(env.get("functions"), Some(&json!([])));
        }
    }

    #[test]
    fn test_page_extra_params_and_payload() {
        let backend = ScriptedBackend::reply(200, r#"{"types": [{"name": "foo"}]}"#);
        let page = PageQuery::new("localTypes", "a.bin", 0, 50, "types")
            .param("includeLibraries", true)
            .extra("includeLibraries", true)
            .timeout(Timeout::Long);
        let env = fetch_paginated(&transport(backend.clone()), &page);
        assert_eq!(env.get("includeLibraries"), Some(&json!(true)));
        assert!(backend.urls()[0].contains("includeLibraries=true"));
    }

    #[test]
    fn test_page_error_attaches_query() {
        let backend = ScriptedBackend::reply(500, r#"{"error": "No binary loaded"}"#);
        let page = PageQuery::new("segments", "a.bin", 0, 10, "segments").param("filter", "x");
        let env = fetch_paginated(&transport(backend), &page);
        assert!(!env.ok);
        assert_eq!(env.error(), Some("No binary loaded"));
        assert_eq!(env.get("status"), Some(&json!(500)));
        assert_eq!(
            env.request(),
            Some(&json!({"offset": 0, "limit": 10, "filter": "x"}))
        );
        assert!(env.get("segments").is_none());
    }

    #[test]
    fn test_page_empty_body_is_no_response() {
        let backend = ScriptedBackend::new(vec![Ok(RawResponse::new(200, ""))]);
        let page = PageQuery::new("sections", "a.bin", 0, 10, "sections");
        let env = fetch_paginated(&transport(backend), &page);
        assert!(!env.ok);
        assert_eq!(env.error(), Some("No response from server"));
    }

    #[test]
    fn test_page_non_mapping_is_raw() {
        let backend = ScriptedBackend::reply(200, "[1, 2]");
        let page = PageQuery::new("imports", "a.bin", 0, 10, "imports");
        let env = fetch_paginated(&transport(backend), &page);
        assert!(env.ok);
        assert_eq!(env.get("raw"), Some(&json!([1, 2])));
    }
}
