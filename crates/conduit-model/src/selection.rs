// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Auto-mode model categories.
//!
//! Tools declare the kind of model they want instead of a concrete name;
//! when the caller passes no model (auto mode) the provider registry turns
//! the category into a concrete choice via
//! [`crate::registry::ProviderRegistry::preferred_fallback`].

use serde::{Deserialize, Serialize};

/// What a tool needs from a model when the caller does not pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolModelCategory {
    /// Quick turnaround over depth (chat-style tools).
    FastResponse,
    /// A middle ground (code review, analysis).
    Balanced,
    /// Deep multi-step reasoning (thinkdeep, debug).
    ExtendedReasoning,
}

impl ToolModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastResponse => "fast_response",
            Self::Balanced => "balanced",
            Self::ExtendedReasoning => "extended_reasoning",
        }
    }
}

impl std::fmt::Display for ToolModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
