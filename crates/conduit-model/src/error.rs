// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider error taxonomy.
//!
//! Every upstream failure is represented as a typed [`ProviderError`]; the
//! retry loop consumes [`crate::retry::is_retryable`] rather than matching on
//! exception strings.  Each variant maps onto a caller-visible [`ErrorKind`].

use crate::capabilities::ProviderKind;
use crate::selection::ToolModelCategory;

/// Caller-visible error classification, surfaced in tool envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    PolicyDenied,
    PathSandbox,
    TooLarge,
    NoModelAvailable,
    UpstreamTransient,
    UpstreamFatal,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::PolicyDenied => "policy_denied",
            Self::PathSandbox => "path_sandbox",
            Self::TooLarge => "too_large",
            Self::NoModelAvailable => "no_model_available",
            Self::UpstreamTransient => "upstream_transient",
            Self::UpstreamFatal => "upstream_fatal",
            Self::Internal => "internal",
        }
    }
}

/// Errors produced by providers, the model registry, and model selection.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The model name is unknown to this provider.
    #[error("model '{model}' is not supported by the {provider} provider")]
    NotSupported {
        provider: ProviderKind,
        model: String,
    },

    /// The model exists but the restriction policy denies it.
    #[error("model '{model}' is not allowed by the {provider} restriction policy")]
    Restricted {
        provider: ProviderKind,
        model: String,
    },

    /// The request was malformed before it reached the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream returned a non-success HTTP status.  `body` carries the
    /// raw (possibly structured) error payload for classification.
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    /// The upstream response parsed but carried no usable content.
    #[error("{provider} returned an unparseable response: {message}")]
    BadResponse {
        provider: ProviderKind,
        message: String,
    },

    /// All retry attempts were consumed by retryable failures.
    #[error("{provider} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        provider: ProviderKind,
        attempts: u32,
        #[source]
        last: Box<ProviderError>,
    },

    /// Model registry configuration problem (duplicate alias, bad JSON).
    /// Fatal at startup.
    #[error("model registry error: {0}")]
    Registry(String),

    /// Auto mode could not find any model for the category.
    #[error(
        "no model available for category {category:?}; available models: {}",
        available.join(", ")
    )]
    NoModelAvailable {
        category: ToolModelCategory,
        available: Vec<String>,
    },
}

impl ProviderError {
    /// Map onto the caller-visible error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotSupported { .. } => ErrorKind::InvalidRequest,
            Self::Restricted { .. } => ErrorKind::PolicyDenied,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Http { .. } | Self::Transport { .. } | Self::BadResponse { .. } => {
                ErrorKind::UpstreamFatal
            }
            Self::RetriesExhausted { .. } => ErrorKind::UpstreamTransient,
            Self::Registry(_) => ErrorKind::Internal,
            Self::NoModelAvailable { .. } => ErrorKind::NoModelAvailable,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
