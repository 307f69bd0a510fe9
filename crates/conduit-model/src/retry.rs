// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Failure classification and the shared retry loop.
//!
//! The classifier distinguishes rate limits that are worth waiting out
//! (request-count limits) from those that are not (token-quantity limits,
//! where retrying the same oversized input can never succeed — the caller
//! must reduce it).

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::capabilities::ProviderKind;
use crate::error::ProviderError;

/// Progressive delays between attempts, in seconds.
pub const RETRY_DELAYS: [u64; 4] = [1, 3, 5, 8];

/// Total attempts, including the first.
pub const MAX_ATTEMPTS: u32 = 4;

/// Whether a failure is worth retrying.
///
/// Retryable: transport errors (network, timeout), HTTP 5xx, 408, and 429s
/// that indicate request-rate limiting (including 429s whose body cannot be
/// parsed).  Fatal: authentication and invalid-request statuses,
/// context-length errors, and 429s whose structured body indicates a
/// token-quantity limit.
pub fn is_retryable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Transport { .. } => true,
        ProviderError::Http { status, body, .. } => match status {
            429 => !is_token_quantity_429(body),
            408 => true,
            s if *s >= 500 => true,
            _ => false,
        },
        _ => false,
    }
}

/// Detect token-quantity indicators in a structured 429 body.
///
/// Matches both JSON (`"type": "tokens"`) and the single-quoted dict form
/// some upstream SDKs embed in their messages, plus the quota / resource
/// phrasing used by other providers.  A body with none of these markers is
/// treated as a request-rate limit.
fn is_token_quantity_429(body: &str) -> bool {
    let lower = body.to_lowercase();
    const MARKERS: [&str; 6] = [
        "\"type\": \"tokens\"",
        "'type': 'tokens'",
        "context_length_exceeded",
        "quota exceeded",
        "resource exhausted",
        "tokens per min",
    ];
    MARKERS.iter().any(|m| lower.contains(m))
}

/// Run `op` up to [`MAX_ATTEMPTS`] times with progressive delays between
/// retryable failures.  Fatal failures propagate immediately; exhausting the
/// attempt budget wraps the last failure in
/// [`ProviderError::RetriesExhausted`].
pub async fn with_retries<T, F, Fut>(
    provider: ProviderKind,
    model: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last: Option<ProviderError> = None;

    for attempt in 0..MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                if attempt + 1 < MAX_ATTEMPTS {
                    let delay = RETRY_DELAYS[attempt as usize];
                    info!(
                        %provider,
                        model,
                        attempt = attempt + 1,
                        total = MAX_ATTEMPTS,
                        delay_s = delay,
                        error = %err,
                        "retryable provider error, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                } else {
                    warn!(%provider, model, error = %err, "retry budget exhausted");
                }
                last = Some(err);
            }
        }
    }

    Err(ProviderError::RetriesExhausted {
        provider,
        attempts: MAX_ATTEMPTS,
        last: Box::new(last.unwrap_or(ProviderError::Transport {
            provider,
            message: "no attempt recorded".into(),
        })),
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
