// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-file diff extraction under a token budget.
//!
//! Diffs are wrapped in stable `--- BEGIN DIFF ---` markers and are NEVER
//! annotated with line numbers: the `@@` hunk headers already carry
//! positions, and prefixing lines would corrupt the patch format.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use conduit_context::estimate_tokens;

use crate::git::{repo_status, run_git};

/// Tokens held back from the context window for the prompt and the reply
/// when packing diffs.
pub const DIFF_BUDGET_RESERVE: usize = 50_000;

/// Which changes to extract.
#[derive(Debug, Clone, Default)]
pub struct DiffRequest {
    /// Compare `ref...HEAD` instead of local changes.
    pub compare_to: Option<String>,
    /// Include index-vs-HEAD diffs.  Ignored when `compare_to` is set.
    pub include_staged: bool,
    /// Include worktree-vs-index diffs.  Ignored when `compare_to` is set.
    pub include_unstaged: bool,
}

/// Per-repository outcome attached to the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct RepoSummary {
    pub path: PathBuf,
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub changed_files: usize,
    /// First 20 changed files, for the summary section.
    pub files: Vec<String>,
    /// Set when the repository could not be processed (e.g. invalid ref).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a budgeted extraction pass over several repositories.
#[derive(Debug, Default)]
pub struct DiffCollection {
    /// Wrapped per-file diffs, in repository-then-file order.
    pub diffs: Vec<String>,
    pub summaries: Vec<RepoSummary>,
    pub tokens_used: usize,
    /// Diffs dropped because the budget ran out.
    pub files_omitted: usize,
}

impl DiffCollection {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Extract per-file diffs from every repository, largest-prefix-first under
/// `max_tokens`.  Once the running total would exceed the budget, remaining
/// diffs are dropped and counted in `files_omitted`.
pub fn collect_diffs(
    repos: &[PathBuf],
    request: &DiffRequest,
    max_tokens: usize,
) -> DiffCollection {
    let mut out = DiffCollection::default();

    for repo in repos {
        let repo_name = repo
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string());
        let status = repo_status(repo);
        let mut changed_files: Vec<String> = Vec::new();

        if let Some(reference) = &request.compare_to {
            // Validate the ref before asking for diffs against it.
            if let Err(e) = run_git(repo, &["rev-parse", "--verify", "--quiet", reference]) {
                out.summaries.push(RepoSummary {
                    path: repo.clone(),
                    branch: status.branch,
                    ahead: status.ahead,
                    behind: status.behind,
                    changed_files: 0,
                    files: Vec::new(),
                    error: Some(format!("invalid or unknown git ref '{reference}': {e}")),
                });
                continue;
            }

            let range = format!("{reference}...HEAD");
            let files = changed_file_list(repo, &["diff", "--name-only", &range]);
            let mode = format!("compare to {reference}");
            for file in &files {
                append_diff(
                    repo,
                    &repo_name,
                    file,
                    &["diff", &range, "--"],
                    &mode,
                    max_tokens,
                    &mut out,
                );
            }
            changed_files = files;
        } else {
            if request.include_staged {
                let files = changed_file_list(repo, &["diff", "--name-only", "--cached"]);
                for file in &files {
                    append_diff(
                        repo,
                        &repo_name,
                        file,
                        &["diff", "--cached", "--"],
                        "staged",
                        max_tokens,
                        &mut out,
                    );
                }
                changed_files.extend(files);
            }
            if request.include_unstaged {
                let files = changed_file_list(repo, &["diff", "--name-only"]);
                for file in &files {
                    append_diff(
                        repo,
                        &repo_name,
                        file,
                        &["diff", "--"],
                        "unstaged",
                        max_tokens,
                        &mut out,
                    );
                }
                changed_files.extend(files);
            }
            changed_files.sort();
            changed_files.dedup();
        }

        if !changed_files.is_empty() {
            out.summaries.push(RepoSummary {
                path: repo.clone(),
                branch: status.branch,
                ahead: status.ahead,
                behind: status.behind,
                changed_files: changed_files.len(),
                files: changed_files.into_iter().take(20).collect(),
                error: None,
            });
        }
    }

    debug!(
        diffs = out.diffs.len(),
        omitted = out.files_omitted,
        tokens = out.tokens_used,
        "diff extraction complete"
    );
    out
}

fn changed_file_list(repo: &Path, args: &[&str]) -> Vec<String> {
    match run_git(repo, args) {
        Ok(output) => output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn append_diff(
    repo: &Path,
    repo_name: &str,
    file: &str,
    diff_args: &[&str],
    mode: &str,
    max_tokens: usize,
    out: &mut DiffCollection,
) {
    let mut args: Vec<&str> = diff_args.to_vec();
    args.push(file);
    let diff = match run_git(repo, &args) {
        Ok(diff) if !diff.trim().is_empty() => diff,
        _ => return,
    };

    let wrapped = format!(
        "\n--- BEGIN DIFF: {repo_name}/{file} ({mode}) ---\n{diff}\n--- END DIFF: {repo_name}/{file} ---\n"
    );
    let tokens = estimate_tokens(&wrapped);
    if out.tokens_used + tokens <= max_tokens {
        out.tokens_used += tokens;
        out.diffs.push(wrapped);
    } else {
        out.files_omitted += 1;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
