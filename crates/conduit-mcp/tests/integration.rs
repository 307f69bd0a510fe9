// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end integration tests for the conduit MCP server.
//!
//! Each test drives a real [`ConduitMcpServer`] over in-memory pipes,
//! sending raw JSON-RPC 2.0 messages and validating the responses.  Raw
//! JSON is used instead of an rmcp client so the tests verify the exact
//! wire format a real MCP host sees, including the four-message handshake
//! and request-id round-tripping.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};

use conduit_config::Config;
use conduit_mcp::ConduitMcpServer;
use conduit_model::{
    registry, restrictions, ModelCapabilities, ModelProvider, MockProvider, ProviderKind,
};
use conduit_tools::{register_builtin_tools, ToolDriver, ToolRegistry};
use rmcp::ServiceExt;

static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn lock() -> MutexGuard<'static, ()> {
    TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|p| p.into_inner())
}

/// Install a mock provider serving one model into the global registry.
fn install_mock_provider() -> Arc<MockProvider> {
    restrictions::reset();
    let caps = ModelCapabilities {
        context_window: 200_000,
        max_output_tokens: 8_192,
        ..ModelCapabilities::new(ProviderKind::Custom, "mock-model")
    };
    let mock = Arc::new(MockProvider::new(ProviderKind::Custom, vec![caps]));
    let for_factory = Arc::clone(&mock);
    let mut reg = registry::global().lock().unwrap_or_else(|p| p.into_inner());
    reg.clear();
    reg.register(
        ProviderKind::Custom,
        Arc::new(move || Ok(Some(Arc::clone(&for_factory) as Arc<dyn ModelProvider>))),
    );
    mock
}

/// Start a server over in-memory pipes; returns the client's write and read
/// halves.  The temp dir backs the driver's workspace root.
async fn start_test_server(
    workspace: &std::path::Path,
) -> (
    WriteHalf<DuplexStream>,
    BufReader<tokio::io::ReadHalf<DuplexStream>>,
) {
    let config = Config {
        default_model: "mock-model".into(),
        workspace_root: std::fs::canonicalize(workspace).unwrap(),
        ..Config::default()
    };
    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);
    let driver = Arc::new(ToolDriver::new(config));
    let server = ConduitMcpServer::new(Arc::new(tools), driver);

    let (client_stream, server_stream) = tokio::io::duplex(65536);
    tokio::spawn(async move {
        if let Ok(running) = server.serve(server_stream).await {
            let _ = running.waiting().await;
        }
    });

    let (client_read, client_write) = tokio::io::split(client_stream);
    (client_write, BufReader::new(client_read))
}

async fn send_msg(writer: &mut WriteHalf<DuplexStream>, msg: &Value) {
    let line = serde_json::to_string(msg).expect("message must serialize");
    writer.write_all(line.as_bytes()).await.expect("write failed");
    writer.write_all(b"\n").await.expect("newline write failed");
    writer.flush().await.expect("flush failed");
}

async fn recv_msg(reader: &mut BufReader<tokio::io::ReadHalf<DuplexStream>>) -> Value {
    let mut line = String::new();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        reader.read_line(&mut line),
    )
    .await
    .expect("timed out waiting for server response")
    .expect("read error");
    serde_json::from_str(line.trim()).expect("server response must be valid JSON")
}

/// Run the four-message handshake; returns the `initialize` result.
async fn initialize(
    writer: &mut WriteHalf<DuplexStream>,
    reader: &mut BufReader<tokio::io::ReadHalf<DuplexStream>>,
) -> Value {
    send_msg(
        writer,
        &json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "conduit-test-client", "version": "0.0.0" }
            }
        }),
    )
    .await;

    let init_resp = recv_msg(reader).await;
    assert_eq!(init_resp["jsonrpc"], "2.0");
    assert!(init_resp["result"].is_object());

    send_msg(
        writer,
        &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;

    init_resp["result"].clone()
}

#[tokio::test]
async fn initialize_declares_tools_capability() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let _mock = install_mock_provider();
    let (mut writer, mut reader) = start_test_server(dir.path()).await;
    let result = initialize(&mut writer, &mut reader).await;
    assert!(
        result["capabilities"]["tools"].is_object(),
        "server must advertise tools capability; got: {result}"
    );
}

#[tokio::test]
async fn tools_list_returns_all_builtin_tools() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let _mock = install_mock_provider();
    let (mut writer, mut reader) = start_test_server(dir.path()).await;
    initialize(&mut writer, &mut reader).await;

    send_msg(
        &mut writer,
        &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {} }),
    )
    .await;

    let resp = recv_msg(&mut reader).await;
    assert_eq!(resp["id"], 1, "request id must round-trip");
    let tools = resp["result"]["tools"].as_array().expect("tools array");
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    for expected in [
        "analyze",
        "chat",
        "codereview",
        "debug",
        "precommit",
        "refactor",
        "testgen",
        "thinkdeep",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}: {names:?}");
    }
    // Schemas travel in inputSchema.
    assert!(tools[0]["inputSchema"]["properties"].is_object());
}

#[tokio::test]
async fn tools_call_returns_envelope_with_round_tripped_id() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let mock = install_mock_provider();
    mock.script(Ok("a helpful answer".into()));
    let (mut writer, mut reader) = start_test_server(dir.path()).await;
    initialize(&mut writer, &mut reader).await;

    send_msg(
        &mut writer,
        &json!({
            "jsonrpc": "2.0",
            "id": 42,
            "method": "tools/call",
            "params": { "name": "chat", "arguments": { "prompt": "hello" } }
        }),
    )
    .await;

    let resp = recv_msg(&mut reader).await;
    assert_eq!(resp["id"], 42, "tool invocation id must round-trip");

    let text = resp["result"]["content"][0]["text"]
        .as_str()
        .expect("one text content");
    let envelope: Value = serde_json::from_str(text).expect("content must be the JSON envelope");
    assert_eq!(envelope["status"], "continuation_available");
    assert_eq!(envelope["content"], "a helpful answer");
    assert_eq!(envelope["metadata"]["tool_name"], "chat");
    assert_eq!(envelope["metadata"]["model_used"], "mock-model");
    assert_eq!(envelope["metadata"]["provider_used"], "custom");
}

#[tokio::test]
async fn unknown_tool_call_returns_error_envelope_not_transport_fault() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let _mock = install_mock_provider();
    let (mut writer, mut reader) = start_test_server(dir.path()).await;
    initialize(&mut writer, &mut reader).await;

    send_msg(
        &mut writer,
        &json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": "nonexistent", "arguments": {} }
        }),
    )
    .await;

    let resp = recv_msg(&mut reader).await;
    assert_eq!(resp["id"], 7);
    assert!(
        resp["result"].is_object(),
        "unknown tool must still produce a result envelope: {resp}"
    );
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["status"], "error");
    assert!(envelope["content"].as_str().unwrap().contains("unknown tool"));
}

#[tokio::test]
async fn provider_failure_surfaces_as_error_envelope() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let mock = install_mock_provider();
    mock.script(Err(conduit_model::ProviderError::Http {
        provider: ProviderKind::Custom,
        status: 401,
        body: "Unauthorized".into(),
    }));
    let (mut writer, mut reader) = start_test_server(dir.path()).await;
    initialize(&mut writer, &mut reader).await;

    send_msg(
        &mut writer,
        &json!({
            "jsonrpc": "2.0",
            "id": 8,
            "method": "tools/call",
            "params": { "name": "chat", "arguments": { "prompt": "hello" } }
        }),
    )
    .await;

    let resp = recv_msg(&mut reader).await;
    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["metadata"]["error_kind"], "upstream_fatal");
    assert_eq!(envelope["metadata"]["tool_name"], "chat");
    assert_eq!(envelope["metadata"]["model_used"], "mock-model");
}
