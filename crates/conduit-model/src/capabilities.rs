// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Capability model: static metadata describing each model's limits and how
//! the runtime must shape requests for it.

use serde::{Deserialize, Serialize};

/// Supported model provider kinds.
///
/// Each kind has a distinct wire format and authentication style.  The tag is
/// carried in logs, response metadata, and restriction lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    OpenAi,
    XAi,
    OpenRouter,
    Custom,
    Dial,
}

impl ProviderKind {
    /// Stable lowercase token used in env var names, logs, and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::XAi => "xai",
            Self::OpenRouter => "openrouter",
            Self::Custom => "custom",
            Self::Dial => "dial",
        }
    }

    /// Env var holding this provider's comma-separated model allow-list.
    pub fn allowed_models_env(&self) -> &'static str {
        match self {
            Self::Google => "GOOGLE_ALLOWED_MODELS",
            Self::OpenAi => "OPENAI_ALLOWED_MODELS",
            Self::XAi => "XAI_ALLOWED_MODELS",
            Self::OpenRouter => "OPENROUTER_ALLOWED_MODELS",
            Self::Custom => "CUSTOM_ALLOWED_MODELS",
            Self::Dial => "DIAL_ALLOWED_MODELS",
        }
    }

    /// All kinds, in the registry's resolution priority order: native
    /// providers first, then the aggregator, then custom/local, then hosted.
    pub fn priority_order() -> [ProviderKind; 6] {
        [
            Self::Google,
            Self::OpenAi,
            Self::XAi,
            Self::OpenRouter,
            Self::Custom,
            Self::Dial,
        ]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a model constrains the sampling temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TemperatureConstraint {
    /// Exactly one accepted value (reasoning models).
    Fixed { value: f64 },
    /// Continuous range with a model default.
    Range { min: f64, max: f64, default: f64 },
    /// A discrete set of accepted values with a default.
    Discrete { allowed: Vec<f64>, default: f64 },
}

impl TemperatureConstraint {
    pub fn fixed(value: f64) -> Self {
        Self::Fixed { value }
    }

    pub fn range(min: f64, max: f64, default: f64) -> Self {
        Self::Range { min, max, default }
    }

    pub fn discrete(allowed: Vec<f64>, default: f64) -> Self {
        Self::Discrete { allowed, default }
    }

    /// Build a constraint from a registry-file tag.
    ///
    /// `"fixed"` is pinned at 1.0 (the value reasoning endpoints accept);
    /// `"discrete"` uses the common published sampling points; anything else
    /// (including an absent tag) falls back to the standard 0.0–2.0 range.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "fixed" => Self::fixed(1.0),
            "discrete" => Self::discrete(vec![0.0, 0.3, 0.7, 1.0, 1.5, 2.0], 0.7),
            _ => Self::range(0.0, 2.0, 0.7),
        }
    }

    pub fn validate(&self, temperature: f64) -> bool {
        match self {
            Self::Fixed { value } => (temperature - value).abs() < 1e-6,
            Self::Range { min, max, .. } => (*min..=*max).contains(&temperature),
            Self::Discrete { allowed, .. } => {
                allowed.iter().any(|v| (temperature - v).abs() < 1e-6)
            }
        }
    }

    /// Nearest valid temperature to the requested one.
    pub fn clamp(&self, temperature: f64) -> f64 {
        match self {
            Self::Fixed { value } => *value,
            Self::Range { min, max, .. } => temperature.clamp(*min, *max),
            Self::Discrete { allowed, default } => allowed
                .iter()
                .copied()
                .min_by(|a, b| {
                    let da = (temperature - a).abs();
                    let db = (temperature - b).abs();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(*default),
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            Self::Fixed { value } => *value,
            Self::Range { default, .. } => *default,
            Self::Discrete { default, .. } => *default,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Fixed { value } => format!("only supports temperature={value}"),
            Self::Range { min, max, .. } => {
                format!("supports temperature range [{min}, {max}]")
            }
            Self::Discrete { allowed, .. } => {
                let values: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                format!("supports temperatures: {}", values.join(", "))
            }
        }
    }
}

impl Default for TemperatureConstraint {
    fn default() -> Self {
        Self::range(0.0, 2.0, 0.7)
    }
}

/// Thinking-depth modes, expressed as a fraction of a model's thinking-token
/// ceiling.  The fractions apply uniformly across every model that accepts a
/// reasoning budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Minimal,
    Low,
    Medium,
    High,
    Max,
}

impl ThinkingMode {
    pub fn fraction(&self) -> f64 {
        match self {
            Self::Minimal => 0.005,
            Self::Low => 0.08,
            Self::Medium => 0.33,
            Self::High => 0.67,
            Self::Max => 1.0,
        }
    }

    /// Absolute token budget for a model with the given ceiling.
    pub fn budget(&self, max_thinking_tokens: u32) -> u32 {
        (f64::from(max_thinking_tokens) * self.fraction()) as u32
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

/// Capabilities and constraints of a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub provider: ProviderKind,
    /// Canonical name — the exact string the provider's API expects.
    pub model_name: String,
    /// Human-friendly provider/model label for logs and metadata.
    pub friendly_name: String,
    /// Alternative names resolved to the canonical before any wire call.
    /// Case-insensitive and unique across all models of one provider.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Total context window in tokens (input + output).
    pub context_window: u32,
    /// Maximum output tokens per request.
    pub max_output_tokens: u32,
    #[serde(default)]
    pub supports_extended_thinking: bool,
    #[serde(default = "default_true")]
    pub supports_system_prompts: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_function_calling: bool,
    #[serde(default)]
    pub supports_images: bool,
    /// Maximum total image payload in MB; 0 when images are unsupported.
    #[serde(default)]
    pub max_image_size_mb: f64,
    /// When false, temperature and temperature-coupled parameters are never
    /// transmitted on the wire, regardless of the constraint below.
    #[serde(default = "default_true")]
    pub supports_temperature: bool,
    /// Thinking-token ceiling for models that accept a reasoning budget.
    #[serde(default)]
    pub max_thinking_tokens: u32,
    /// Models that only work against custom/local endpoints.
    #[serde(default)]
    pub is_custom: bool,
    /// Generic-conservative capabilities for an unknown aggregator model;
    /// parameter validation against these is advisory only.
    #[serde(default, skip_serializing)]
    pub is_generic: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub temperature: TemperatureConstraint,
}

fn default_true() -> bool {
    true
}

impl ModelCapabilities {
    /// Minimal record used as the base for provider tables and tests.
    pub fn new(provider: ProviderKind, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            friendly_name: String::new(),
            aliases: Vec::new(),
            context_window: 0,
            max_output_tokens: 0,
            supports_extended_thinking: false,
            supports_system_prompts: true,
            supports_streaming: true,
            supports_function_calling: false,
            supports_images: false,
            max_image_size_mb: 0.0,
            supports_temperature: true,
            max_thinking_tokens: 0,
            is_custom: false,
            is_generic: false,
            description: String::new(),
            temperature: TemperatureConstraint::default(),
        }
    }
}

/// Token accounting for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from a model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Canonical model name the call was issued against.
    pub model_name: String,
    pub friendly_name: String,
    pub provider: ProviderKind,
    /// Provider-specific extras (finish reason, upstream id, …).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_constraint_accepts_only_its_value() {
        let c = TemperatureConstraint::fixed(1.0);
        assert!(c.validate(1.0));
        assert!(!c.validate(0.7));
        assert_eq!(c.clamp(0.2), 1.0);
        assert_eq!(c.default_value(), 1.0);
    }

    #[test]
    fn range_constraint_clamps_to_bounds() {
        let c = TemperatureConstraint::range(0.0, 2.0, 0.7);
        assert!(c.validate(0.0));
        assert!(c.validate(2.0));
        assert!(!c.validate(2.5));
        assert_eq!(c.clamp(2.5), 2.0);
        assert_eq!(c.clamp(-1.0), 0.0);
        assert_eq!(c.clamp(1.3), 1.3);
    }

    #[test]
    fn discrete_constraint_snaps_to_nearest_value() {
        let c = TemperatureConstraint::discrete(vec![0.0, 0.3, 0.7, 1.0], 0.7);
        assert!(c.validate(0.3));
        assert!(!c.validate(0.5));
        assert_eq!(c.clamp(0.5), 0.3);
        assert_eq!(c.clamp(0.9), 1.0);
    }

    #[test]
    fn from_tag_fixed_is_pinned_at_one() {
        let c = TemperatureConstraint::from_tag("fixed");
        assert_eq!(c.default_value(), 1.0);
        assert!(!c.validate(0.7));
    }

    #[test]
    fn from_tag_unknown_falls_back_to_range() {
        let c = TemperatureConstraint::from_tag("bogus");
        assert!(matches!(c, TemperatureConstraint::Range { .. }));
    }

    #[test]
    fn thinking_budget_scales_with_mode() {
        assert_eq!(ThinkingMode::Max.budget(32_768), 32_768);
        assert_eq!(ThinkingMode::Medium.budget(32_768), 10_813);
        assert_eq!(ThinkingMode::Minimal.budget(32_768), 163);
    }

    #[test]
    fn thinking_mode_parses_known_names_only() {
        assert_eq!(ThinkingMode::parse("high"), Some(ThinkingMode::High));
        assert_eq!(ThinkingMode::parse("ultra"), None);
    }

    #[test]
    fn provider_kind_tokens_are_lowercase() {
        for kind in ProviderKind::priority_order() {
            let token = kind.as_str();
            assert_eq!(token, token.to_lowercase());
        }
    }

    #[test]
    fn priority_order_starts_with_natives_and_ends_with_hosted() {
        let order = ProviderKind::priority_order();
        assert_eq!(order[0], ProviderKind::Google);
        assert_eq!(order[3], ProviderKind::OpenRouter);
        assert_eq!(order[5], ProviderKind::Dial);
    }

    #[test]
    fn capabilities_default_flags_are_conservative() {
        let caps = ModelCapabilities::new(ProviderKind::Custom, "m");
        assert!(caps.supports_system_prompts);
        assert!(caps.supports_temperature);
        assert!(!caps.supports_extended_thinking);
        assert!(!caps.supports_images);
        assert!(!caps.is_generic);
    }
}
