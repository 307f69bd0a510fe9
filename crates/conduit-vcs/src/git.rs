// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Git subprocess plumbing and porcelain-status parsing.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

/// Per-command timeout for git sub-processes.
const GIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("git {command} timed out")]
    Timeout { command: String },
    #[error("git could not be executed: {0}")]
    Spawn(String),
}

/// Run a git command in `repo` with a hard timeout.  Returns trimmed stdout
/// on success.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<String, GitError> {
    use std::sync::mpsc;
    use std::thread;

    let command = args.join(" ");
    let repo = repo.to_path_buf();
    let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = std::process::Command::new("git")
            .args(&owned)
            .current_dir(&repo)
            .output();
        let _ = tx.send(result);
    });

    let output = match rx.recv_timeout(GIT_TIMEOUT) {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(GitError::Spawn(e.to_string())),
        Err(_) => return Err(GitError::Timeout { command }),
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        Err(GitError::CommandFailed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}

/// Working-tree state of one repository.  Produced on demand, never
/// persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoStatus {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub staged_files: Vec<String>,
    pub unstaged_files: Vec<String>,
    pub untracked_files: Vec<String>,
}

/// Collect branch, ahead/behind counts, and the three change sets.
///
/// Every sub-command failure degrades to an empty field rather than an
/// error: status is advisory context, not a gate.
pub fn repo_status(repo: &Path) -> RepoStatus {
    let mut status = RepoStatus::default();

    if let Ok(branch) = run_git(repo, &["branch", "--show-current"]) {
        status.branch = branch;
    }

    if !status.branch.is_empty() {
        let range = format!("{}@{{upstream}}...HEAD", status.branch);
        if let Ok(counts) = run_git(repo, &["rev-list", "--count", "--left-right", &range]) {
            let parts: Vec<&str> = counts.split_whitespace().collect();
            if parts.len() == 2 {
                status.behind = parts[0].parse().unwrap_or(0);
                status.ahead = parts[1].parse().unwrap_or(0);
            }
        }
        // No upstream configured is normal; ahead/behind stay zero.
    }

    if let Ok(porcelain) = run_git(repo, &["status", "--porcelain"]) {
        parse_porcelain(&porcelain, &mut status);
    }

    status
}

/// Parse `git status --porcelain` output into the three change sets.
fn parse_porcelain(output: &str, status: &mut RepoStatus) {
    for line in output.lines() {
        if line.len() < 3 {
            continue;
        }
        let code: Vec<char> = line[..2].chars().collect();
        let path_info = &line[3..];

        // Index (staged) column.
        match code[0] {
            'R' => {
                // "old -> new" for renames; record the new path.
                let new_path = path_info
                    .split_once(" -> ")
                    .map(|(_, new)| new)
                    .unwrap_or(path_info);
                status.staged_files.push(new_path.to_string());
            }
            'M' | 'A' | 'D' | 'C' => status.staged_files.push(path_info.to_string()),
            _ => {}
        }

        // Worktree (unstaged) column.
        if matches!(code[1], 'M' | 'D') {
            status.unstaged_files.push(path_info.to_string());
        } else if code[0] == '?' && code[1] == '?' {
            status.untracked_files.push(path_info.to_string());
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_staged_and_unstaged_columns() {
        let mut status = RepoStatus::default();
        parse_porcelain("M  staged.rs\n M unstaged.rs\nMM both.rs\n?? new.rs\n", &mut status);
        assert_eq!(status.staged_files, vec!["staged.rs", "both.rs"]);
        assert_eq!(status.unstaged_files, vec!["unstaged.rs", "both.rs"]);
        assert_eq!(status.untracked_files, vec!["new.rs"]);
    }

    #[test]
    fn porcelain_rename_records_new_path() {
        let mut status = RepoStatus::default();
        parse_porcelain("R  old.rs -> new.rs\n", &mut status);
        assert_eq!(status.staged_files, vec!["new.rs"]);
    }

    #[test]
    fn porcelain_added_and_deleted() {
        let mut status = RepoStatus::default();
        parse_porcelain("A  added.rs\nD  deleted.rs\n D gone.rs\n", &mut status);
        assert_eq!(status.staged_files, vec!["added.rs", "deleted.rs"]);
        assert_eq!(status.unstaged_files, vec!["gone.rs"]);
    }

    #[test]
    fn empty_porcelain_output_is_clean() {
        let mut status = RepoStatus::default();
        parse_porcelain("", &mut status);
        assert!(status.staged_files.is_empty());
        assert!(status.unstaged_files.is_empty());
        assert!(status.untracked_files.is_empty());
    }
}
