//! End-to-end protocol tests against a mock Binary Ninja HTTP server.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use binja_bridge::{PolicySource, RetryPolicy, ServerUrl, Transport};
use binja_bridge_mcp::protocol::ProtocolHandler;
use binja_bridge_mcp::tools::{ActionContext, ActionRegistry};
use binja_bridge_mcp::transport::StdioTransport;
use binja_bridge_mcp::types::*;

// ─────────────────────── helpers ───────────────────────

fn registry(uri: &str) -> Arc<ActionRegistry> {
    let policy = PolicySource::Fixed(RetryPolicy {
        max_wait_seconds: 1.0,
        default_retry_after_seconds: 0.05,
        ..RetryPolicy::default()
    });
    let transport = Transport::new(ServerUrl::new(uri)).with_policy(policy);
    Arc::new(ActionRegistry::with_workers(ActionContext::new(transport), 4))
}

fn handler(uri: &str) -> ProtocolHandler {
    ProtocolHandler::new(registry(uri))
}

/// Drop on a worker thread; the blocking HTTP client must not be dropped on
/// the async runtime.
async fn finish<T: Send + 'static>(value: T) {
    tokio::task::spawn_blocking(move || drop(value)).await.unwrap();
}

/// Build an MCP JSON-RPC request.
fn mcp_request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    mcp_request(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

/// Send a JSON-RPC message through the handler and return the response.
async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

async fn send_unwrap(handler: &ProtocolHandler, msg: Value) -> Value {
    send(handler, msg).await.expect("expected response")
}

/// Decode the envelope carried in a tool call response.
fn envelope_of(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).unwrap()
}

async fn mount_status(server: &MockServer, filename: &str) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"filename": filename})))
        .mount(server)
        .await;
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_initialize_and_list() {
    let server = MockServer::start().await;
    let h = handler(&server.uri());

    let init = send_unwrap(
        &h,
        mcp_request(
            0,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0"}
            }),
        ),
    )
    .await;
    assert_eq!(init["result"]["protocolVersion"], MCP_VERSION);

    let list = send_unwrap(&h, mcp_request(1, "tools/list", json!({}))).await;
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 54);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    finish(h).await;
}

#[tokio::test]
async fn test_tool_call_reports_active_file() {
    let server = MockServer::start().await;
    mount_status(&server, "/bins/firmware.elf").await;
    Mock::given(method("GET"))
        .and(path("/functionAt"))
        .and(query_param("address", "0x401000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"functions": ["main"]})))
        .expect(1)
        .mount(&server)
        .await;

    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(2, "function_at", json!({"address": "0x401000"}))).await;
    assert_eq!(
        envelope_of(&resp),
        json!({"ok": true, "file": "/bins/firmware.elf", "functions": ["main"]})
    );

    finish(h).await;
}

#[tokio::test]
async fn test_paginated_listing() {
    let server = MockServer::start().await;
    mount_status(&server, "a.bin").await;
    Mock::given(method("GET"))
        .and(path("/methods"))
        .and(query_param("offset", "5"))
        .and(query_param("limit", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"functions": ["main", "parse_header"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(3, "list_methods", json!({"offset": 5, "limit": "2"}))).await;
    let env = envelope_of(&resp);
    assert_eq!(env["ok"], true);
    assert_eq!(env["functions"], json!(["main", "parse_header"]));

    finish(h).await;
}

#[tokio::test]
async fn test_busy_upstream_is_retried() {
    let server = MockServer::start().await;
    mount_status(&server, "a.bin").await;
    Mock::given(path("/decompile"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0.1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/decompile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"decompiled": "void f() {}"})))
        .mount(&server)
        .await;

    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(4, "decompile_function", json!({"name": "f"}))).await;
    assert_eq!(envelope_of(&resp)["decompiled"], "void f() {}");

    finish(h).await;
}

#[tokio::test]
async fn test_upstream_failure_stays_in_envelope() {
    let server = MockServer::start().await;
    Mock::given(path("/getTypeInfo"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Unknown type"})))
        .mount(&server)
        .await;

    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(5, "get_type_info", json!({"type_name": "foo_t"}))).await;
    assert!(resp.get("error").is_none());
    let env = envelope_of(&resp);
    assert_eq!(env["ok"], false);
    assert_eq!(env["file"], "(none)");
    assert_eq!(env["error"], "Unknown type");
    assert_eq!(env["status"], 404);
    assert_eq!(env["request"], json!({"name": "foo_t"}));

    finish(h).await;
}

#[tokio::test]
async fn test_unreachable_upstream() {
    // Bind then release a port so nothing is listening on it.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let h = handler(&uri);
    let resp = send_unwrap(&h, tool_call(6, "list_binaries", json!({}))).await;
    let env = envelope_of(&resp);
    assert_eq!(env["ok"], false);
    assert!(env["error"].as_str().unwrap().starts_with("Request failed"));

    finish(h).await;
}

#[tokio::test]
async fn test_unknown_tool() {
    let server = MockServer::start().await;
    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(7, "does_not_exist", json!({}))).await;
    assert_eq!(resp["error"]["code"], mcp_error_codes::TOOL_NOT_FOUND);
    assert_eq!(resp["id"], 7);
    finish(h).await;
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_upstream() {
    let server = MockServer::start().await;
    Mock::given(path("/searchFunctions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = handler(&server.uri());
    let resp = send_unwrap(&h, tool_call(8, "search_functions_by_name", json!({"query": ""}))).await;
    let env = envelope_of(&resp);
    assert_eq!(env["ok"], false);
    assert_eq!(env["error"], "Query string is required");

    finish(h).await;
}

#[tokio::test]
async fn test_stdio_session() {
    let server = MockServer::start().await;
    mount_status(&server, "a.bin").await;
    Mock::given(path("/platforms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"platforms": ["linux-x86_64"]})))
        .mount(&server)
        .await;

    let transport = StdioTransport::new(handler(&server.uri()));
    let (mut client_out, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, client_in) = tokio::io::duplex(64 * 1024);
    let session = tokio::spawn(async move {
        let result = transport.serve(server_in, server_out).await;
        (transport, result)
    });

    let mut script = String::new();
    for msg in [
        mcp_request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0"}
            }),
        ),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        tool_call(2, "list_platforms", json!({})),
    ] {
        script.push_str(&msg.to_string());
        script.push('\n');
    }
    client_out.write_all(script.as_bytes()).await.unwrap();

    let mut lines = BufReader::new(client_in).lines();
    let mut replies = Vec::new();
    while replies.len() < 2 {
        let line = lines.next_line().await.unwrap().expect("reply line");
        replies.push(serde_json::from_str::<Value>(&line).unwrap());
    }
    drop(client_out);

    let (transport, result) = session.await.unwrap();
    result.unwrap();
    finish(transport).await;

    replies.sort_by_key(|r| r["id"].as_i64());
    assert_eq!(replies[0]["result"]["serverInfo"]["name"], SERVER_NAME);
    assert_eq!(
        envelope_of(&replies[1]),
        json!({"ok": true, "file": "(none)", "platforms": ["linux-x86_64"]})
    );
}
