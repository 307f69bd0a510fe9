// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Type conversions between conduit's tool types and rmcp's MCP model types.
//!
//! Pure, stateless functions at the seam between the tool layer and the
//! wire protocol; neither side needs to know about the other.

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, JsonObject, Tool as McpTool};

use conduit_tools::{OutputStatus, ToolOutput, ToolSchema};

/// Convert a [`ToolSchema`] into an rmcp tool descriptor.
pub fn schema_to_mcp_tool(schema: ToolSchema) -> McpTool {
    let input_schema: JsonObject = value_to_object(schema.parameters);
    McpTool::new(
        std::borrow::Cow::Owned(schema.name),
        std::borrow::Cow::Owned(schema.description),
        Arc::new(input_schema),
    )
}

/// MCP requires the input schema to be a JSON object; wrap anything else in
/// a minimal `{"type":"object"}` envelope.
fn value_to_object(v: serde_json::Value) -> JsonObject {
    use serde_json::{Map, Value};
    match v {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("type".to_string(), Value::String("object".to_string()));
            m.insert("value".to_string(), other);
            m
        }
    }
}

/// Convert a tool envelope into an rmcp call result.
///
/// The whole envelope — status, content, metadata — travels as one JSON
/// text content so the host can parse it uniformly; the MCP `is_error` flag
/// mirrors the envelope status.
pub fn output_to_call_result(output: ToolOutput) -> CallToolResult {
    let is_error = output.status == OutputStatus::Error;
    let payload = output.to_json().to_string();
    let content = vec![Content::text(payload)];

    if is_error {
        CallToolResult {
            content,
            is_error: Some(true),
            structured_content: None,
            meta: None,
        }
    } else {
        CallToolResult::success(content)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_model::ErrorKind;
    use serde_json::{json, Map, Value};

    fn make_schema(name: &str, params: Value) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            description: "desc".to_string(),
            parameters: params,
        }
    }

    #[test]
    fn schema_conversion_preserves_name_and_description() {
        let tool = schema_to_mcp_tool(make_schema("chat", json!({"type": "object"})));
        assert_eq!(tool.name.as_ref(), "chat");
        assert_eq!(tool.description.as_deref(), Some("desc"));
    }

    #[test]
    fn object_schema_passes_through() {
        let tool = schema_to_mcp_tool(make_schema(
            "chat",
            json!({"type": "object", "properties": {"prompt": {"type": "string"}}}),
        ));
        assert!(tool.input_schema.contains_key("properties"));
    }

    #[test]
    fn non_object_schema_gets_wrapped() {
        let tool = schema_to_mcp_tool(make_schema("chat", json!("oops")));
        assert_eq!(
            tool.input_schema.get("type"),
            Some(&Value::String("object".to_string()))
        );
    }

    #[test]
    fn success_envelope_maps_to_success_result() {
        let out = ToolOutput::success("hello", Map::new());
        let result = output_to_call_result(out);
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn error_envelope_sets_is_error_but_stays_an_envelope() {
        let out = ToolOutput::error(ErrorKind::UpstreamFatal, "boom", Map::new());
        let result = output_to_call_result(out);
        assert_eq!(result.is_error, Some(true));
        // Round-trip through serde the way the wire would see it.
        let wire = serde_json::to_value(&result).unwrap();
        let text = wire["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["status"], json!("error"));
        assert_eq!(parsed["metadata"]["error_kind"], json!("upstream_fatal"));
    }

    #[test]
    fn resend_prompt_envelope_is_not_an_mcp_error() {
        let out = ToolOutput::resend_prompt(70_000, Map::new());
        let result = output_to_call_result(out);
        assert_eq!(result.is_error, Some(false));
    }
}
