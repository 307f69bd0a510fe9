// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Token estimation heuristics.
//!
//! Neither function is exact — callers must leave headroom against real
//! context windows.  Text uses the 4-characters-per-token approximation;
//! files use per-extension bytes-per-token ratios, which track observed
//! tokenizer behaviour per format more closely than a flat divisor.

use std::path::Path;

use crate::file_types::token_estimation_ratio;

/// Estimate tokens for in-memory text (~4 characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Estimate tokens for a file from its on-disk size and extension ratio.
/// Missing files estimate to zero.
pub fn estimate_file_tokens(path: &Path) -> usize {
    let size = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return 0,
    };
    (size as f64 / token_estimation_ratio(path)) as usize
}

/// Check `text` against a token ceiling; returns `(fits, estimate)`.
pub fn check_token_limit(text: &str, max_tokens: usize) -> (bool, usize) {
    let estimate = estimate_tokens(text);
    (estimate <= max_tokens, estimate)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn four_chars_per_token() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
    }

    #[test]
    fn file_estimate_uses_extension_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&vec![b'x'; 1000]).unwrap();
        // JSON ratio is 2.5 bytes/token.
        assert_eq!(estimate_file_tokens(&path), 400);
    }

    #[test]
    fn missing_file_estimates_to_zero() {
        assert_eq!(estimate_file_tokens(Path::new("/no/such/file.rs")), 0);
    }

    #[test]
    fn token_limit_check_reports_estimate() {
        let (fits, estimate) = check_token_limit("aaaaaaaa", 1);
        assert!(!fits);
        assert_eq!(estimate, 2);
        let (fits, _) = check_token_limit("aaaaaaaa", 2);
        assert!(fits);
    }
}
