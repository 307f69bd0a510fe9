// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The tool interface and the response envelope.
//!
//! Every tool call — success or failure — returns a [`ToolOutput`] envelope;
//! the transport never sees a bare error.  Metadata always carries
//! `tool_name`, and once a model has been chosen, `model_used` (the
//! caller-supplied spelling, not the resolved canonical) and
//! `provider_used`.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use conduit_context::{ConversationStore, Sandbox, SandboxError};
use conduit_model::{ErrorKind, ModelCapabilities, ThinkingMode, ToolModelCategory};

/// Hard ceiling on the caller-supplied prompt, in characters.  Larger
/// prompts get a `resend_prompt` envelope instead of a wire call.
pub const MAX_PROMPT_CHARS: usize = 60_000;

/// Low-variance temperature for analytical work (reviews, debugging).
pub const TEMPERATURE_ANALYTICAL: f64 = 0.2;
/// Middle ground for conversational tools.
pub const TEMPERATURE_BALANCED: f64 = 0.5;
/// Higher-variance temperature for exploratory reasoning.
pub const TEMPERATURE_CREATIVE: f64 = 0.7;

/// Envelope status, mirrored on the wire as snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Success,
    Error,
    /// The prompt exceeded the size gate; the caller should shrink and
    /// resend rather than waste a provider round-trip.
    ResendPrompt,
    /// The model asked for more context before answering.
    RequiresClarification,
    /// Success, and the thread id in metadata accepts follow-up calls.
    ContinuationAvailable,
}

/// The single JSON object every tool call returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolOutput {
    pub status: OutputStatus,
    pub content: String,
    pub content_type: String,
    pub metadata: Map<String, Value>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            status: OutputStatus::Success,
            content: content.into(),
            content_type: "text".into(),
            metadata,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let mut metadata = metadata;
        metadata.insert("error_kind".into(), json!(kind.as_str()));
        Self {
            status: OutputStatus::Error,
            content: message.into(),
            content_type: "text".into(),
            metadata,
        }
    }

    pub fn resend_prompt(prompt_chars: usize, metadata: Map<String, Value>) -> Self {
        let mut metadata = metadata;
        metadata.insert("prompt_chars".into(), json!(prompt_chars));
        metadata.insert("max_prompt_chars".into(), json!(MAX_PROMPT_CHARS));
        Self {
            status: OutputStatus::ResendPrompt,
            content: format!(
                "The prompt is too large ({prompt_chars} characters, limit {MAX_PROMPT_CHARS}). \
                 Move long content into files and pass their paths instead, then resend."
            ),
            content_type: "text".into(),
            metadata,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({
                "status": "error",
                "content": "envelope serialization failed",
                "content_type": "text",
                "metadata": { "error_kind": "internal" },
            })
        })
    }
}

/// Fields every tool request shares.  Tool-specific fields stay in `raw`
/// and are deserialized by the tool itself.
#[derive(Debug, Clone, Default)]
pub struct ToolRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub continuation_id: Option<String>,
    pub files: Vec<String>,
    pub temperature: Option<f64>,
    pub thinking_mode: Option<ThinkingMode>,
    pub use_websearch: bool,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct CommonFields {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    continuation_id: Option<String>,
    #[serde(default)]
    files: Option<Vec<String>>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    thinking_mode: Option<String>,
    #[serde(default)]
    use_websearch: Option<bool>,
}

impl ToolRequest {
    /// Parse the shared fields, keeping the raw object for tool-specific
    /// deserialization.
    pub fn parse(args: Value) -> Result<Self, ToolError> {
        let common: CommonFields = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidRequest(format!("malformed arguments: {e}")))?;
        let thinking_mode = match common.thinking_mode.as_deref() {
            None => None,
            Some(raw) => Some(ThinkingMode::parse(raw).ok_or_else(|| {
                ToolError::InvalidRequest(format!(
                    "unknown thinking_mode '{raw}' (expected minimal/low/medium/high/max)"
                ))
            })?),
        };
        Ok(Self {
            prompt: common.prompt.unwrap_or_default(),
            model: common.model,
            continuation_id: common.continuation_id,
            files: common.files.unwrap_or_default(),
            temperature: common.temperature,
            thinking_mode,
            use_websearch: common.use_websearch.unwrap_or(false),
            raw: args,
        })
    }

    /// Tool-specific view over the raw arguments.
    pub fn extra<T: serde::de::DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(self.raw.clone())
            .map_err(|e| ToolError::InvalidRequest(format!("malformed arguments: {e}")))
    }
}

/// Failures raised while preparing a prompt, before the provider is called.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("{0}")]
    TooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Sandbox(_) => ErrorKind::PathSandbox,
            Self::TooLarge(_) => ErrorKind::TooLarge,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Resources a tool may draw on while preparing its prompt.
pub struct ToolContext<'a> {
    pub sandbox: &'a Sandbox,
    pub conversations: &'a ConversationStore,
    /// Capabilities of the model the driver selected for this call.
    pub capabilities: &'a ModelCapabilities,
}

/// A prepared prompt plus the bookkeeping the driver records on the thread.
#[derive(Debug, Default)]
pub struct PreparedPrompt {
    pub text: String,
    /// Files considered present for this turn (embedded now or already
    /// embedded earlier in the thread).
    pub files: Vec<String>,
}

/// One developer-assistance tool.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.  In auto mode `model` becomes
    /// required and enumerates every currently available model.
    fn input_schema(&self, auto_mode: bool, available_models: &[String]) -> Value;

    /// What kind of model this tool wants in auto mode.
    fn category(&self) -> ToolModelCategory;

    fn default_temperature(&self) -> f64 {
        TEMPERATURE_BALANCED
    }

    /// The opaque system prompt sent with every call of this tool.
    fn system_prompt(&self) -> &str;

    /// Whether embedded files carry line-number prefixes.  Off by default.
    fn wants_line_numbers(&self) -> bool {
        false
    }

    /// Whether successful calls record turns and offer a continuation id.
    fn supports_continuation(&self) -> bool {
        true
    }

    /// Build the provider prompt from the validated request.
    fn prepare_prompt(
        &self,
        request: &ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<PreparedPrompt, ToolError>;

    /// Post-process the model's reply before it enters the envelope.
    fn format_response(&self, response: &str, _request: &ToolRequest) -> String {
        response.to_string()
    }
}

/// Shared schema scaffold: the fields every tool accepts, with tool-specific
/// properties merged in.  `required` lists tool-specific required fields;
/// `model` is appended automatically in auto mode.
pub fn base_schema(
    auto_mode: bool,
    available_models: &[String],
    extra_properties: Value,
    required: &[&str],
) -> Value {
    let mut properties = json!({
        "prompt": {
            "type": "string",
            "description": "The question or request to send to the model."
        },
        "files": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Optional files or directories for context (absolute paths)."
        },
        "continuation_id": {
            "type": "string",
            "description": "Thread id from a previous call to continue that conversation."
        },
        "temperature": {
            "type": "number",
            "minimum": 0.0,
            "maximum": 2.0,
            "description": "Sampling temperature; clamped to the model's supported range."
        },
        "thinking_mode": {
            "type": "string",
            "enum": ["minimal", "low", "medium", "high", "max"],
            "description": "Reasoning depth for models with a thinking budget."
        },
        "use_websearch": {
            "type": "boolean",
            "default": false,
            "description": "Allow the model to request web searches for current information."
        }
    });

    if auto_mode {
        properties["model"] = json!({
            "type": "string",
            "enum": available_models,
            "description": "Model to use (required because DEFAULT_MODEL=auto)."
        });
    } else {
        properties["model"] = json!({
            "type": "string",
            "description": "Model name or alias; omit to use the server default."
        });
    }

    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra_properties.as_object())
    {
        for (key, value) in extra {
            props.insert(key.clone(), value.clone());
        }
    }

    let mut required_fields: Vec<String> = required.iter().map(|s| s.to_string()).collect();
    if auto_mode {
        required_fields.push("model".into());
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required_fields,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_extracts_common_fields() {
        let req = ToolRequest::parse(json!({
            "prompt": "hello",
            "model": "flash",
            "files": ["/a.py"],
            "thinking_mode": "high",
            "use_websearch": true
        }))
        .unwrap();
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.model.as_deref(), Some("flash"));
        assert_eq!(req.files, vec!["/a.py"]);
        assert_eq!(req.thinking_mode, Some(ThinkingMode::High));
        assert!(req.use_websearch);
    }

    #[test]
    fn parse_rejects_unknown_thinking_mode() {
        let err = ToolRequest::parse(json!({ "thinking_mode": "ultra" })).unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(_)));
    }

    #[test]
    fn extra_reads_tool_specific_fields() {
        #[derive(Deserialize)]
        struct Extra {
            path: String,
        }
        let req = ToolRequest::parse(json!({ "prompt": "p", "path": "/x" })).unwrap();
        let extra: Extra = req.extra().unwrap();
        assert_eq!(extra.path, "/x");
    }

    #[test]
    fn error_envelope_carries_kind_in_metadata() {
        let out = ToolOutput::error(ErrorKind::PathSandbox, "bad path", Map::new());
        assert_eq!(out.status, OutputStatus::Error);
        assert_eq!(out.metadata["error_kind"], json!("path_sandbox"));
    }

    #[test]
    fn resend_prompt_envelope_names_the_limit() {
        let out = ToolOutput::resend_prompt(70_000, Map::new());
        assert_eq!(out.status, OutputStatus::ResendPrompt);
        assert!(out.content.contains("70000"));
        assert_eq!(out.metadata["max_prompt_chars"], json!(MAX_PROMPT_CHARS));
    }

    #[test]
    fn envelope_serializes_with_snake_case_status() {
        let out = ToolOutput::success("hi", Map::new());
        let value = out.to_json();
        assert_eq!(value["status"], json!("success"));
        assert_eq!(value["content"], json!("hi"));
    }

    #[test]
    fn auto_mode_schema_requires_model_with_enum() {
        let schema = base_schema(true, &["flash".into(), "o3".into()], json!({}), &["prompt"]);
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("model")));
        assert_eq!(schema["properties"]["model"]["enum"], json!(["flash", "o3"]));
    }

    #[test]
    fn manual_mode_schema_leaves_model_optional() {
        let schema = base_schema(false, &[], json!({}), &["prompt"]);
        let required = schema["required"].as_array().unwrap();
        assert!(!required.contains(&json!("model")));
        assert!(schema["properties"]["model"]["enum"].is_null());
    }

    #[test]
    fn extra_properties_merge_into_schema() {
        let schema = base_schema(
            false,
            &[],
            json!({ "path": { "type": "string" } }),
            &["path"],
        );
        assert!(schema["properties"]["path"].is_object());
        assert!(schema["required"].as_array().unwrap().contains(&json!("path")));
    }
}
