// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model restriction service.
//!
//! Administrators limit which models each provider may expose by setting
//! `<PROVIDER>_ALLOWED_MODELS` env vars (comma-separated, case-insensitive,
//! whitespace-trimmed).  An unset or empty var means no restriction for that
//! provider.
//!
//! Allow-lists are checked against *both* the resolved canonical name and the
//! token the caller actually used: listing a canonical grants access through
//! every alias of that model, and listing an alias grants access through that
//! alias and the canonical it resolves to — but not through a sibling alias.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::capabilities::ProviderKind;
use crate::provider::ModelProvider;

/// Immutable-after-construction restriction policy.
#[derive(Debug, Default)]
pub struct RestrictionService {
    restrictions: HashMap<ProviderKind, HashSet<String>>,
}

impl RestrictionService {
    /// Load restrictions from the process environment.
    pub fn from_env() -> Self {
        let mut restrictions = HashMap::new();

        for kind in ProviderKind::priority_order() {
            let env_var = kind.allowed_models_env();
            let raw = match std::env::var(env_var) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if raw.trim().is_empty() {
                debug!(%kind, "{env_var} empty — all models allowed");
                continue;
            }

            let models: HashSet<String> = raw
                .split(',')
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect();

            if models.is_empty() {
                debug!(%kind, "{env_var} contains only whitespace — all models allowed");
                continue;
            }

            let mut sorted: Vec<&String> = models.iter().collect();
            sorted.sort();
            info!(%kind, allowed = ?sorted, "model allow-list configured");
            restrictions.insert(kind, models);
        }

        Self { restrictions }
    }

    /// Build a service from an explicit map (tests, embedding).
    pub fn from_map(restrictions: HashMap<ProviderKind, HashSet<String>>) -> Self {
        Self { restrictions }
    }

    /// Check whether a model is allowed for a provider.
    ///
    /// `canonical` is the name after alias resolution; `original` is the
    /// token the caller supplied (may equal `canonical`).  The model is
    /// allowed if either name, lowercased, appears in the allow-set, or when
    /// no allow-set exists for the provider.
    pub fn is_allowed(
        &self,
        provider: ProviderKind,
        canonical: &str,
        original: Option<&str>,
    ) -> bool {
        let allowed = match self.restrictions.get(&provider) {
            None => return true,
            Some(set) if set.is_empty() => return true,
            Some(set) => set,
        };

        if allowed.contains(&canonical.to_lowercase()) {
            return true;
        }
        match original {
            Some(name) => allowed.contains(&name.to_lowercase()),
            None => false,
        }
    }

    pub fn has_restrictions(&self, provider: ProviderKind) -> bool {
        self.restrictions.contains_key(&provider)
    }

    /// The raw allow-set for a provider, or `None` when unrestricted.
    pub fn allowed_set(&self, provider: ProviderKind) -> Option<&HashSet<String>> {
        self.restrictions.get(&provider)
    }

    /// Drop names not allowed for `provider` from `models`.
    pub fn filter(&self, provider: ProviderKind, models: Vec<String>) -> Vec<String> {
        if !self.has_restrictions(provider) {
            return models;
        }
        models
            .into_iter()
            .filter(|m| self.is_allowed(provider, m, None))
            .collect()
    }

    /// Warn about allow-list entries that no provider recognises.
    ///
    /// Validation is non-fatal: a typo in an allow-list should not take the
    /// server down, but the operator should hear about it.  The check runs
    /// against `list_all_known_models()` (canonicals plus aliases) so that an
    /// allow-list naming an alias target never produces a false warning.
    pub fn validate_against_known(
        &self,
        providers: &HashMap<ProviderKind, Arc<dyn ModelProvider>>,
    ) {
        for (kind, allowed) in &self.restrictions {
            let provider = match providers.get(kind) {
                Some(p) => p,
                None => continue,
            };
            let known: HashSet<String> = provider
                .list_all_known_models()
                .into_iter()
                .map(|m| m.to_lowercase())
                .collect();

            for entry in allowed {
                if !known.contains(entry) {
                    let mut sorted: Vec<&String> = known.iter().collect();
                    sorted.sort();
                    warn!(
                        provider = %kind,
                        model = %entry,
                        env_var = kind.allowed_models_env(),
                        known = ?sorted,
                        "allow-list entry is not a recognised model — check for typos"
                    );
                }
            }
        }
    }

    /// Restriction summary for startup logging.
    pub fn summary(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut out = BTreeMap::new();
        for (kind, allowed) in &self.restrictions {
            let mut models: Vec<String> = allowed.iter().cloned().collect();
            models.sort();
            out.insert(kind.as_str(), models);
        }
        out
    }
}

// ─── Process-wide service ─────────────────────────────────────────────────────

static SERVICE: RwLock<Option<Arc<RestrictionService>>> = RwLock::new(None);

/// The process-wide restriction service, lazily loaded from the environment.
pub fn service() -> Arc<RestrictionService> {
    if let Ok(guard) = SERVICE.read() {
        if let Some(svc) = guard.as_ref() {
            return Arc::clone(svc);
        }
    }
    let fresh = Arc::new(RestrictionService::from_env());
    if let Ok(mut guard) = SERVICE.write() {
        // Another thread may have initialised while we built; theirs wins.
        if let Some(existing) = guard.as_ref() {
            return Arc::clone(existing);
        }
        *guard = Some(Arc::clone(&fresh));
    }
    fresh
}

/// Discard the cached service so the next [`service()`] call re-reads the
/// environment.  Tests that flip `*_ALLOWED_MODELS` vars call this between
/// scenarios.
pub fn reset() {
    if let Ok(mut guard) = SERVICE.write() {
        *guard = None;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
