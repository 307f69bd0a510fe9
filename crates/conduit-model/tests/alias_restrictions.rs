// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Alias/target symmetry of the restriction policy, exercised against the
//! real provider tables.
//!
//! These tests mutate `*_ALLOWED_MODELS` env vars, which are process-global;
//! a mutex serializes them so the restriction service is never re-read
//! mid-scenario.

use std::sync::{Mutex, MutexGuard, OnceLock};

use conduit_model::{restrictions, ModelProvider, OpenAiProvider, XAiProvider};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvScenario {
    var: &'static str,
    _guard: MutexGuard<'static, ()>,
}

impl EnvScenario {
    fn set(var: &'static str, value: &str) -> Self {
        let guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        std::env::set_var(var, value);
        restrictions::reset();
        Self { var, _guard: guard }
    }
}

impl Drop for EnvScenario {
    fn drop(&mut self) {
        std::env::remove_var(self.var);
        restrictions::reset();
    }
}

fn openai() -> OpenAiProvider {
    OpenAiProvider::new("test-key".into(), None)
}

#[test]
fn allow_list_naming_canonical_admits_every_alias() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "o4-mini");
    let provider = openai();

    assert!(provider.validate("o4-mini"), "canonical itself must pass");
    assert!(provider.validate("mini"), "alias of listed canonical must pass");
    assert!(provider.validate("o4mini"), "second alias must pass too");
    assert!(!provider.validate("o3"), "unlisted model must be denied");
    assert!(!provider.validate("o3mini"), "alias of unlisted model must be denied");
}

#[test]
fn allow_list_naming_alias_admits_alias_and_canonical_only() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "mini");
    let provider = openai();

    assert!(provider.validate("mini"), "the listed alias must pass");
    assert!(
        provider.validate("o4-mini"),
        "the canonical the alias resolves to must pass"
    );
    assert!(
        !provider.validate("o4mini"),
        "a sibling alias of the same canonical must NOT pass"
    );
    // Listing enables the canonical in restriction-respecting listings too.
    let models = provider.list_models(true);
    assert_eq!(models, vec!["o4-mini".to_string()]);
}

#[test]
fn both_alias_and_canonical_requests_succeed_when_either_is_listed() {
    // Scenario S2: `OPENAI_ALLOWED_MODELS=mini` and calls with both "mini"
    // and the canonical succeed.
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "mini,o4-mini");
    let provider = openai();
    assert!(provider.validate("mini"));
    assert!(provider.validate("o4-mini"));
}

#[test]
fn allow_list_is_whitespace_and_case_tolerant() {
    let _scenario = EnvScenario::set("XAI_ALLOWED_MODELS", " GROK-3 , grok-3-fast ");
    let provider = XAiProvider::new("test-key".into(), None);
    assert!(provider.validate("grok-3"));
    assert!(provider.validate("GROK"));
    assert!(provider.validate("grok3fast"));
}

#[test]
fn empty_allow_list_means_no_restriction() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "   ");
    let provider = openai();
    assert!(provider.validate("o3"));
    assert!(provider.validate("mini"));
}

#[test]
fn restricted_capabilities_lookup_fails_with_policy_error() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "o3");
    let provider = openai();
    let err = provider.capabilities("o4-mini").unwrap_err();
    assert!(err.to_string().contains("restriction policy"));
}

#[test]
fn list_models_respects_restrictions() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "o3,o4-mini");
    let provider = openai();
    let models = provider.list_models(true);
    assert!(models.contains(&"o3".to_string()));
    assert!(models.contains(&"o4-mini".to_string()));
    assert!(!models.contains(&"o3-mini".to_string()));

    // Bypassing restrictions lists the full table.
    let all = provider.list_models(false);
    assert!(all.contains(&"o3-mini".to_string()));
}

#[test]
fn no_provider_reports_duplicate_known_models() {
    let _scenario = EnvScenario::set("OPENAI_ALLOWED_MODELS", "");
    let providers: Vec<Box<dyn ModelProvider>> = vec![
        Box::new(openai()),
        Box::new(XAiProvider::new("k".into(), None)),
        Box::new(conduit_model::GoogleProvider::new("k".into(), None)),
        Box::new(conduit_model::DialProvider::new("k".into(), None, None)),
    ];
    for provider in providers {
        let known = provider.list_all_known_models();
        let mut deduped = known.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(
            known.len(),
            deduped.len(),
            "{} reports duplicate known models",
            provider.kind()
        );
    }
}
