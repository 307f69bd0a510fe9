// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Directory expansion and token-budgeted file packing.
//!
//! Files are embedded between stable `--- BEGIN FILE ---` / `--- END FILE ---`
//! markers; unreadable paths become marker stubs rather than call failures so
//! one bad path never aborts a whole prompt.  Line numbering is opt-in per
//! tool and is applied after normalizing CRLF/CR to LF, keeping numbers
//! stable across platforms.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::file_types::is_context_file;
use crate::sandbox::{is_self_directory, Sandbox, EXCLUDED_DIRS};
use crate::tokens::estimate_tokens;

/// Files above this size are replaced with a `FILE TOO LARGE` stub.
pub const MAX_FILE_SIZE: u64 = 1_000_000;

/// Normalize CRLF and bare CR line endings to LF.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Prefix each line with a right-aligned number, `│`, and a space.
///
/// Width grows with the file: minimum 4 digits, 5 from 10,000 lines up.
pub fn add_line_numbers(text: &str) -> String {
    let normalized = normalize_line_endings(text);
    let lines: Vec<&str> = normalized.lines().collect();
    let width = line_number_width(lines.len());
    let mut out = String::with_capacity(normalized.len() + lines.len() * (width + 2));
    for (idx, line) in lines.iter().enumerate() {
        out.push_str(&format!("{:>width$}│ {}\n", idx + 1, line, width = width));
    }
    out
}

/// Digit width for a file with `total_lines` lines (minimum 4).
pub fn line_number_width(total_lines: usize) -> usize {
    let digits = total_lines.max(1).to_string().len();
    digits.max(4)
}

/// Expand files and directories into a deduplicated, sorted file list.
///
/// Directories are walked recursively; hidden entries, the fixed
/// excluded-directory set, and anything resembling the server's own source
/// tree are skipped.  Directory contents are filtered to recognised context
/// extensions; explicitly named files are taken as-is.
pub fn expand_paths(sandbox: &Sandbox, paths: &[String]) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();

    for path_str in paths {
        let resolved = match sandbox.resolve(path_str) {
            Ok(p) => p,
            Err(e) => {
                debug!(path = %path_str, error = %e, "skipping invalid path during expansion");
                continue;
            }
        };

        if resolved.is_file() {
            seen.insert(resolved);
            continue;
        }
        if !resolved.is_dir() {
            continue;
        }

        let walker = WalkDir::new(&resolved)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') && entry.depth() > 0 {
                    return false;
                }
                if entry.file_type().is_dir() {
                    if EXCLUDED_DIRS.contains(&name.as_ref()) {
                        return false;
                    }
                    if is_self_directory(entry.path()) {
                        return false;
                    }
                }
                true
            });

        for entry in walker.flatten() {
            if entry.file_type().is_file() && is_context_file(entry.path()) {
                seen.insert(entry.path().to_path_buf());
            }
        }
    }

    seen.into_iter().collect()
}

/// Read one file formatted for embedding.  Returns `(content, tokens)`.
///
/// Invalid, missing, oversized, and unreadable paths produce stub sections
/// instead of errors.
pub fn read_file_content(
    sandbox: &Sandbox,
    path_str: &str,
    line_numbers: bool,
) -> (String, usize) {
    let path = match sandbox.resolve(path_str) {
        Ok(p) => p,
        Err(e) => {
            let content = format!(
                "\n--- ERROR ACCESSING FILE: {path_str} ---\nError: {e}\n--- END FILE ---\n"
            );
            let tokens = estimate_tokens(&content);
            return (content, tokens);
        }
    };

    if !path.exists() {
        let content = format!(
            "\n--- FILE NOT FOUND: {path_str} ---\nError: File does not exist\n--- END FILE ---\n"
        );
        let tokens = estimate_tokens(&content);
        return (content, tokens);
    }
    if !path.is_file() {
        let content = format!(
            "\n--- NOT A FILE: {path_str} ---\nError: Path is not a file\n--- END FILE ---\n"
        );
        let tokens = estimate_tokens(&content);
        return (content, tokens);
    }

    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    if size > MAX_FILE_SIZE {
        let content = format!(
            "\n--- FILE TOO LARGE: {path_str} ---\nFile size: {size} bytes (max: {MAX_FILE_SIZE})\n--- END FILE ---\n"
        );
        let tokens = estimate_tokens(&content);
        return (content, tokens);
    }

    match std::fs::read(&path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let body = if line_numbers {
                add_line_numbers(&text)
            } else {
                normalize_line_endings(&text)
            };
            let content =
                format!("\n--- BEGIN FILE: {path_str} ---\n{body}\n--- END FILE: {path_str} ---\n");
            let tokens = estimate_tokens(&content);
            (content, tokens)
        }
        Err(e) => {
            let content = format!(
                "\n--- ERROR READING FILE: {path_str} ---\nError: {e}\n--- END FILE ---\n"
            );
            let tokens = estimate_tokens(&content);
            (content, tokens)
        }
    }
}

/// Outcome of a budgeted packing pass.
#[derive(Debug, Default)]
pub struct PackResult {
    /// Concatenated file sections plus the skipped-files footer.
    pub content: String,
    /// One-line human summary for logs and tool metadata.
    pub summary: String,
    pub files_read: Vec<PathBuf>,
    pub files_skipped: Vec<PathBuf>,
    pub tokens_used: usize,
}

/// Pack files into a token budget.
///
/// `reserve_tokens` is subtracted from `max_tokens` before any file is
/// considered.  Files that would push the running estimate past the budget
/// are recorded as skipped; up to ten of them are listed in a footer so the
/// model knows context is incomplete.
pub fn read_files_to_budget(
    sandbox: &Sandbox,
    paths: &[String],
    max_tokens: usize,
    reserve_tokens: usize,
    line_numbers: bool,
) -> PackResult {
    let available = max_tokens.saturating_sub(reserve_tokens);
    let mut result = PackResult::default();
    let mut parts: Vec<String> = Vec::new();

    let dirs_processed = paths
        .iter()
        .filter(|p| Path::new(p.as_str()).is_dir())
        .count();

    let files = expand_paths(sandbox, paths);
    if files.is_empty() && !paths.is_empty() {
        parts.push(format!(
            "\n--- NO FILES FOUND ---\nProvided paths: {}\n--- END ---\n",
            paths.join(", ")
        ));
    }

    for file in files {
        let path_str = file.to_string_lossy().to_string();
        if result.tokens_used >= available {
            result.files_skipped.push(file);
            continue;
        }
        let (content, tokens) = read_file_content(sandbox, &path_str, line_numbers);
        if result.tokens_used + tokens <= available {
            parts.push(content);
            result.tokens_used += tokens;
            result.files_read.push(file);
        } else {
            result.files_skipped.push(file);
        }
    }

    if !result.files_skipped.is_empty() {
        let mut footer = String::from("\n\n--- SKIPPED FILES (TOKEN LIMIT) ---\n");
        footer.push_str(&format!("Total skipped: {}\n", result.files_skipped.len()));
        for file in result.files_skipped.iter().take(10) {
            footer.push_str(&format!("  - {}\n", file.display()));
        }
        if result.files_skipped.len() > 10 {
            footer.push_str(&format!("  ... and {} more\n", result.files_skipped.len() - 10));
        }
        footer.push_str("--- END SKIPPED FILES ---\n");
        parts.push(footer);
    }

    let mut summary_parts: Vec<String> = Vec::new();
    if dirs_processed > 0 {
        summary_parts.push(format!("Processed {dirs_processed} dir(s)"));
    }
    if !result.files_read.is_empty() {
        summary_parts.push(format!("Read {} file(s)", result.files_read.len()));
    }
    if !result.files_skipped.is_empty() {
        summary_parts.push(format!(
            "Skipped {} file(s) (token limit)",
            result.files_skipped.len()
        ));
    }
    if result.tokens_used > 0 {
        summary_parts.push(format!("~{} tokens used", result.tokens_used));
    }

    result.content = parts.join("\n");
    result.summary = if summary_parts.is_empty() {
        "No input provided".to_string()
    } else {
        summary_parts.join(" | ")
    };
    result
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_in(dir: &Path) -> Sandbox {
        Sandbox::new(std::fs::canonicalize(dir).unwrap())
    }

    // ── Line numbering ────────────────────────────────────────────────────

    #[test]
    fn small_files_use_width_four() {
        let numbered = add_line_numbers("alpha\nbeta\n");
        assert!(numbered.starts_with("   1│ alpha\n"));
        assert!(numbered.contains("   2│ beta\n"));
    }

    #[test]
    fn ten_thousand_lines_use_width_five() {
        assert_eq!(line_number_width(9_999), 4);
        assert_eq!(line_number_width(10_000), 5);
        assert_eq!(line_number_width(99_999), 5);
    }

    #[test]
    fn crlf_is_normalized_before_numbering() {
        let numbered = add_line_numbers("one\r\ntwo\rthree\n");
        assert!(numbered.contains("   1│ one\n"));
        assert!(numbered.contains("   2│ two\n"));
        assert!(numbered.contains("   3│ three\n"));
        assert!(!numbered.contains('\r'));
    }

    // ── Expansion ─────────────────────────────────────────────────────────

    #[test]
    fn expansion_walks_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("zeta.rs"), "z").unwrap();
        std::fs::write(root.join("src/app.py"), "a").unwrap();
        std::fs::write(root.join("binary.exe"), "b").unwrap();

        let sb = sandbox_in(root);
        let files = expand_paths(&sb, &[root.to_string_lossy().to_string()]);
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["app.py", "zeta.rs"]);
    }

    #[test]
    fn hidden_and_excluded_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join(".hidden/a.rs"), "x").unwrap();
        std::fs::write(root.join("node_modules/pkg/b.js"), "x").unwrap();
        std::fs::write(root.join("keep.rs"), "x").unwrap();

        let sb = sandbox_in(root);
        let files = expand_paths(&sb, &[root.to_string_lossy().to_string()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.rs"));
    }

    #[test]
    fn duplicate_paths_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.rs");
        std::fs::write(&file, "x").unwrap();
        let sb = sandbox_in(dir.path());
        let arg = file.to_string_lossy().to_string();
        let files = expand_paths(&sb, &[arg.clone(), arg]);
        assert_eq!(files.len(), 1);
    }

    // ── Reading and stubs ─────────────────────────────────────────────────

    #[test]
    fn readable_file_is_wrapped_in_markers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "payload").unwrap();
        let sb = sandbox_in(dir.path());
        let (content, tokens) = read_file_content(&sb, &file.to_string_lossy(), false);
        assert!(content.contains(&format!("--- BEGIN FILE: {} ---", file.display())));
        assert!(content.contains("payload"));
        assert!(content.contains(&format!("--- END FILE: {} ---", file.display())));
        assert!(tokens > 0);
    }

    #[test]
    fn missing_file_becomes_not_found_stub() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        let missing = dir.path().join("nope.txt");
        let (content, tokens) = read_file_content(&sb, &missing.to_string_lossy(), false);
        assert!(content.contains("--- FILE NOT FOUND:"));
        assert!(tokens > 0);
    }

    #[test]
    fn directory_becomes_not_a_file_stub() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let sb = sandbox_in(dir.path());
        let (content, _) = read_file_content(&sb, &sub.to_string_lossy(), false);
        assert!(content.contains("--- NOT A FILE:"));
    }

    #[test]
    fn oversized_file_becomes_too_large_stub() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.log");
        std::fs::write(&file, vec![b'x'; (MAX_FILE_SIZE + 1) as usize]).unwrap();
        let sb = sandbox_in(dir.path());
        let (content, _) = read_file_content(&sb, &file.to_string_lossy(), false);
        assert!(content.contains("--- FILE TOO LARGE:"));
    }

    #[test]
    fn sandbox_violation_becomes_error_stub_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        let (content, _) = read_file_content(&sb, "relative.txt", false);
        assert!(content.contains("--- ERROR ACCESSING FILE:"));
    }

    // ── Budgeted packing ──────────────────────────────────────────────────

    #[test]
    fn packing_stops_at_the_budget_and_reports_skips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // Three ~400-token files against a ~900-token budget.
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(root.join(name), "x".repeat(1600)).unwrap();
        }
        let sb = sandbox_in(root);
        let result = read_files_to_budget(
            &sb,
            &[root.to_string_lossy().to_string()],
            900,
            0,
            false,
        );
        assert_eq!(result.files_read.len(), 2);
        assert_eq!(result.files_skipped.len(), 1);
        assert!(result.content.contains("--- SKIPPED FILES (TOKEN LIMIT) ---"));
        assert!(result.content.contains("Total skipped: 1"));
        assert!(result.summary.contains("Read 2 file(s)"));
        assert!(result.summary.contains("Skipped 1 file(s)"));
    }

    #[test]
    fn reserve_tokens_shrink_the_budget() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.txt"), "x".repeat(1600)).unwrap();
        let sb = sandbox_in(root);
        let with_reserve = read_files_to_budget(
            &sb,
            &[root.to_string_lossy().to_string()],
            500,
            450,
            false,
        );
        assert!(with_reserve.files_read.is_empty());
        assert_eq!(with_reserve.files_skipped.len(), 1);
    }

    #[test]
    fn skipped_footer_lists_at_most_ten_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for i in 0..14 {
            std::fs::write(root.join(format!("f{i:02}.txt")), "x".repeat(4000)).unwrap();
        }
        let sb = sandbox_in(root);
        let result =
            read_files_to_budget(&sb, &[root.to_string_lossy().to_string()], 10, 0, false);
        assert_eq!(result.files_skipped.len(), 14);
        assert!(result.content.contains("... and 4 more"));
    }

    #[test]
    fn no_files_found_section_when_paths_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let sb = sandbox_in(dir.path());
        let result = read_files_to_budget(
            &sb,
            &[empty.to_string_lossy().to_string()],
            1000,
            0,
            false,
        );
        assert!(result.content.contains("--- NO FILES FOUND ---"));
    }
}
