// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! File-type classification and per-extension token estimation ratios.

use std::path::Path;

/// Programming language source extensions.
pub const PROGRAMMING_LANGUAGES: [&str; 21] = [
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "go", "rs", "rb",
    "php", "swift", "kt", "scala", "r", "m", "mm",
];

/// Script and shell extensions.
pub const SCRIPTS: [&str; 8] = ["sql", "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd"];

/// Configuration and structured-data extensions.
pub const CONFIGS: [&str; 10] = [
    "yml", "yaml", "json", "xml", "toml", "ini", "cfg", "conf", "properties", "env",
];

/// Documentation and markup extensions.
pub const DOCS: [&str; 4] = ["txt", "md", "rst", "tex"];

/// Web asset extensions.
pub const WEB: [&str; 5] = ["html", "css", "scss", "sass", "less"];

/// Log and tabular-data extensions.
pub const TEXT_DATA: [&str; 3] = ["log", "csv", "tsv"];

/// True when `path` has an extension the server treats as readable context.
pub fn is_context_file(path: &Path) -> bool {
    match extension_of(path) {
        Some(ext) => CODE_GROUPS.iter().any(|group| group.contains(&ext.as_str())),
        None => false,
    }
}

const CODE_GROUPS: [&[&str]; 6] = [
    &PROGRAMMING_LANGUAGES,
    &SCRIPTS,
    &CONFIGS,
    &DOCS,
    &WEB,
    &TEXT_DATA,
];

/// True for programming-language sources — the files line numbering makes
/// sense for.
pub fn is_code_file(path: &Path) -> bool {
    match extension_of(path) {
        Some(ext) => PROGRAMMING_LANGUAGES.contains(&ext.as_str()),
        None => false,
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Bytes-per-token ratio for a file, by extension.
///
/// Derived from empirical tokenization of each format; denser formats
/// (JSON, HTML) spend more tokens per byte than prose.  Unknown extensions
/// use a conservative 3.5.
pub fn token_estimation_ratio(path: &Path) -> f64 {
    let ext = match extension_of(path) {
        Some(e) => e,
        None => return DEFAULT_RATIO,
    };
    match ext.as_str() {
        // Programming languages
        "py" => 3.5,
        "js" => 3.2,
        "ts" => 3.3,
        "jsx" => 3.1,
        "tsx" => 3.0,
        "java" => 3.6,
        "cpp" => 3.7,
        "c" => 3.8,
        "go" => 3.9,
        "rs" => 3.5,
        "php" => 3.3,
        "rb" => 3.6,
        "swift" => 3.4,
        "kt" => 3.5,
        "scala" => 3.2,
        // Scripts
        "sh" => 4.1,
        "bat" => 4.0,
        "ps1" => 3.8,
        "sql" => 3.8,
        // Data and configuration
        "json" => 2.5,
        "yaml" | "yml" => 3.0,
        "xml" => 2.8,
        "toml" => 3.2,
        // Documentation
        "md" => 4.2,
        "txt" => 4.0,
        "rst" => 4.1,
        // Web
        "html" => 2.9,
        "css" => 3.4,
        // Logs and data
        "log" => 4.5,
        "csv" => 3.1,
        _ => DEFAULT_RATIO,
    }
}

const DEFAULT_RATIO: f64 = 3.5;

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn source_files_are_context_files() {
        assert!(is_context_file(&PathBuf::from("/a/main.rs")));
        assert!(is_context_file(&PathBuf::from("/a/app.PY")));
        assert!(is_context_file(&PathBuf::from("/a/config.yaml")));
        assert!(is_context_file(&PathBuf::from("/a/README.md")));
    }

    #[test]
    fn binaries_and_unknown_extensions_are_not() {
        assert!(!is_context_file(&PathBuf::from("/a/app.exe")));
        assert!(!is_context_file(&PathBuf::from("/a/image.png")));
        assert!(!is_context_file(&PathBuf::from("/a/noext")));
    }

    #[test]
    fn only_programming_languages_count_as_code() {
        assert!(is_code_file(&PathBuf::from("/a/lib.rs")));
        assert!(!is_code_file(&PathBuf::from("/a/config.json")));
        assert!(!is_code_file(&PathBuf::from("/a/notes.md")));
    }

    #[test]
    fn ratios_differentiate_dense_and_prose_formats() {
        let json = token_estimation_ratio(&PathBuf::from("x.json"));
        let md = token_estimation_ratio(&PathBuf::from("x.md"));
        assert!(json < md, "JSON packs more tokens per byte than prose");
    }

    #[test]
    fn unknown_extension_uses_default_ratio() {
        assert_eq!(token_estimation_ratio(&PathBuf::from("x.zig")), 3.5);
        assert_eq!(token_estimation_ratio(&PathBuf::from("Makefile")), 3.5);
    }
}
