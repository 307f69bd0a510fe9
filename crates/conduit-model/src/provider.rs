// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The provider interface and the alias-resolution table shared by every
//! concrete back-end.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::capabilities::{
    ModelCapabilities, ModelResponse, ProviderKind, TemperatureConstraint, ThinkingMode,
};
use crate::error::ProviderError;
use crate::restrictions;
use crate::selection::ToolModelCategory;

/// Parameters for one generation call, shaped per model capabilities before
/// serialization.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
    pub thinking_mode: Option<ThinkingMode>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub seed: Option<u64>,
    pub stop: Option<Vec<String>>,
    /// Base64 data URLs; forwarded only to models that support images.
    pub images: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: 0.7,
            max_output_tokens: None,
            thinking_mode: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            stop: None,
            images: Vec::new(),
        }
    }
}

/// Case-insensitive alias-resolution table, built once at provider
/// construction.  Resolution is pure: no I/O, no allocation beyond the
/// returned string.
#[derive(Debug, Default, Clone)]
pub struct ModelTable {
    /// canonical name → capabilities (ordered for deterministic listing).
    models: BTreeMap<String, ModelCapabilities>,
    /// lowercase alias or canonical → canonical.
    lookup: HashMap<String, String>,
}

impl ModelTable {
    /// Build a table, rejecting duplicate aliases and aliases that collide
    /// with a different model's canonical name.
    pub fn new(entries: Vec<ModelCapabilities>) -> Result<Self, ProviderError> {
        let mut models = BTreeMap::new();
        let mut lookup: HashMap<String, String> = HashMap::new();

        for caps in entries {
            let canonical = caps.model_name.clone();
            let canonical_lower = canonical.to_lowercase();

            if let Some(existing) = lookup.get(&canonical_lower) {
                if existing != &canonical {
                    return Err(ProviderError::Registry(format!(
                        "duplicate model name '{canonical}' (case-insensitive) collides with '{existing}'"
                    )));
                }
            }
            lookup.insert(canonical_lower, canonical.clone());

            for alias in &caps.aliases {
                let alias_lower = alias.to_lowercase();
                if let Some(existing) = lookup.get(&alias_lower) {
                    if existing != &canonical {
                        return Err(ProviderError::Registry(format!(
                            "duplicate alias '{alias}' found for models '{existing}' and '{canonical}'"
                        )));
                    }
                    continue;
                }
                lookup.insert(alias_lower, canonical.clone());
            }

            models.insert(canonical, caps);
        }

        Ok(Self { models, lookup })
    }

    /// Resolve a name or alias to its canonical form, case-insensitively.
    /// Unknown names come back unchanged.
    pub fn resolve(&self, name_or_alias: &str) -> String {
        match self.lookup.get(&name_or_alias.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => name_or_alias.to_string(),
        }
    }

    pub fn get(&self, canonical: &str) -> Option<&ModelCapabilities> {
        self.models.get(canonical)
    }

    pub fn contains(&self, name_or_alias: &str) -> bool {
        self.lookup.contains_key(&name_or_alias.to_lowercase())
    }

    /// Canonical names in deterministic order.
    pub fn canonical_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Lowercased union of canonical names and aliases, sorted, deduplicated.
    pub fn all_known(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lookup.keys().cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelCapabilities)> {
        self.models.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

/// Interface every model provider implements.
///
/// Most of the policy surface (alias resolution, restriction checks,
/// temperature shaping, listing) is implemented here against the provider's
/// [`ModelTable`]; concrete back-ends supply the table, the wire call, and
/// any endpoint-specific routing.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Human-friendly provider label ("Gemini", "OpenAI", …).
    fn friendly_name(&self) -> &str;

    /// The provider's capability table (built at construction).
    fn table(&self) -> &ModelTable;

    /// Resolve an alias to its canonical name; returns the input unchanged
    /// when it is unknown to this provider.
    fn resolve_model_name(&self, name_or_alias: &str) -> String {
        self.table().resolve(name_or_alias)
    }

    /// Capabilities for a model, or an error when the model is unknown or
    /// denied by the restriction policy.
    fn capabilities(&self, name_or_alias: &str) -> Result<ModelCapabilities, ProviderError> {
        let canonical = self.resolve_model_name(name_or_alias);
        let caps = self
            .table()
            .get(&canonical)
            .ok_or_else(|| ProviderError::NotSupported {
                provider: self.kind(),
                model: name_or_alias.to_string(),
            })?;
        if !allowed_by_policy(self.table(), self.kind(), &canonical, name_or_alias) {
            return Err(ProviderError::Restricted {
                provider: self.kind(),
                model: name_or_alias.to_string(),
            });
        }
        Ok(caps.clone())
    }

    /// Whether this provider can serve the given name under current policy.
    fn validate(&self, name_or_alias: &str) -> bool {
        self.capabilities(name_or_alias).is_ok()
    }

    /// Canonical names this provider currently exposes.  Aliases are not
    /// included; resolution happens before listing matters.
    fn list_models(&self, respect_restrictions: bool) -> Vec<String> {
        let names = self.table().canonical_names();
        if !respect_restrictions {
            return names;
        }
        names
            .into_iter()
            .filter(|n| allowed_by_policy(self.table(), self.kind(), n, n))
            .collect()
    }

    /// Every name this provider knows — canonicals and aliases, lowercased.
    /// Used only by restriction validation, which must not warn when an
    /// administrator lists an alias target.
    fn list_all_known_models(&self) -> Vec<String> {
        self.table().all_known()
    }

    fn supports_thinking(&self, name_or_alias: &str) -> bool {
        let canonical = self.resolve_model_name(name_or_alias);
        self.table()
            .get(&canonical)
            .map(|c| c.supports_extended_thinking)
            .unwrap_or(false)
    }

    /// The temperature to transmit, or `None` when the model rejects the
    /// parameter entirely.  Out-of-range requests are clamped, not refused.
    fn effective_temperature(&self, name_or_alias: &str, requested: f64) -> Option<f64> {
        let canonical = self.resolve_model_name(name_or_alias);
        let caps = match self.table().get(&canonical) {
            Some(c) => c,
            // Unknown model: pass the request through and let the wire call fail.
            None => return Some(requested),
        };
        if !caps.supports_temperature {
            return None;
        }
        Some(caps.temperature.clamp(requested))
    }

    /// Preferred model for an auto-mode category, honoring restrictions.
    ///
    /// The default scans this provider's allowed models: extended-reasoning
    /// prefers a thinking-capable model and falls back to the largest context
    /// window; fast-response picks the smallest window as a throughput hint;
    /// balanced defers to the fast pick.  Native providers override this with
    /// curated variants.
    fn preferred_model(&self, category: ToolModelCategory) -> Option<String> {
        generic_preferred(self.table(), self.kind(), category)
    }

    /// Issue one generation call.  Implementations resolve the alias, check
    /// policy, shape the request from capability flags, and submit with
    /// retries.
    async fn generate(
        &self,
        prompt: &str,
        name_or_alias: &str,
        options: &GenerateOptions,
    ) -> Result<ModelResponse, ProviderError>;

    /// Token count for `text` under this provider's tokenizer.  The default
    /// is the 4-characters-per-token heuristic; callers must leave headroom.
    fn count_tokens(&self, text: &str, _model_name: &str) -> usize {
        text.len() / 4
    }

    /// Release pooled transport resources.  Default: nothing to release.
    fn close(&self) {}
}

/// Temperature default used when a tool supplies none and the model's
/// constraint is unavailable.
pub fn default_temperature(constraint: Option<&TemperatureConstraint>) -> f64 {
    constraint.map(|c| c.default_value()).unwrap_or(0.7)
}

/// Restriction-policy check with alias/target symmetry.
///
/// Resolution has already run: `canonical` is the resolved name, `original`
/// the token the caller used.  Both are tested against the allow-set; in
/// addition, a request spelled as the canonical itself is admitted when the
/// allow-set names any of that model's aliases.  A request through a
/// *different* alias stays denied — only the alias the administrator listed
/// (and the canonical) pass.
pub fn allowed_by_policy(
    table: &ModelTable,
    kind: ProviderKind,
    canonical: &str,
    original: &str,
) -> bool {
    let svc = restrictions::service();
    if svc.is_allowed(kind, canonical, Some(original)) {
        return true;
    }
    if original.eq_ignore_ascii_case(canonical) {
        if let (Some(caps), Some(set)) = (table.get(canonical), svc.allowed_set(kind)) {
            return caps.aliases.iter().any(|a| set.contains(&a.to_lowercase()));
        }
    }
    false
}

/// Category-driven pick over a capability table, honoring restrictions.
///
/// Extended-reasoning prefers a thinking-capable model and falls back to the
/// largest context window; fast-response picks the smallest window as a
/// throughput hint; balanced defers to the fast pick.  Providers with a
/// curated fast/balanced variant check their candidates first and use this
/// as the fallback.
pub fn generic_preferred(
    table: &ModelTable,
    kind: ProviderKind,
    category: ToolModelCategory,
) -> Option<String> {
    let names: Vec<String> = table
        .canonical_names()
        .into_iter()
        .filter(|n| allowed_by_policy(table, kind, n, n))
        .collect();
    if names.is_empty() {
        return None;
    }
    let caps_of = |name: &String| table.get(name);

    match category {
        ToolModelCategory::ExtendedReasoning => names
            .iter()
            .find(|n| caps_of(n).map(|c| c.supports_extended_thinking).unwrap_or(false))
            .cloned()
            .or_else(|| {
                names
                    .iter()
                    .max_by_key(|n| caps_of(n).map(|c| c.context_window).unwrap_or(0))
                    .cloned()
            }),
        ToolModelCategory::FastResponse | ToolModelCategory::Balanced => names
            .iter()
            .min_by_key(|n| caps_of(n).map(|c| c.context_window).unwrap_or(u32::MAX))
            .cloned(),
    }
}

/// First candidate allowed under current restrictions and present in the
/// table, resolved to its canonical name.  Used by providers with curated
/// per-category variants.
pub fn first_allowed(
    table: &ModelTable,
    kind: ProviderKind,
    candidates: &[&str],
) -> Option<String> {
    for candidate in candidates {
        let canonical = table.resolve(candidate);
        if table.get(&canonical).is_some()
            && allowed_by_policy(table, kind, &canonical, candidate)
        {
            return Some(canonical);
        }
    }
    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
