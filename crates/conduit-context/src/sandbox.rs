// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Path sandboxing.
//!
//! Every file path received from a tool call passes through
//! [`Sandbox::resolve`]: relative paths are refused, container-side prefixes
//! are rewritten, the result is canonicalized (so symlinks cannot escape)
//! and checked to lie inside the workspace root.  Two extra protections
//! guard common foot-guns: the user's home directory *root* is refused
//! outright (any subdirectory is fine), and directories that look like the
//! server's own source tree are refused to prevent self-ingestion.

use std::path::{Component, Path, PathBuf};

/// Directory names skipped during expansion and repository discovery.
pub const EXCLUDED_DIRS: [&str; 16] = [
    "node_modules",
    ".git",
    "build",
    "dist",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".next",
    ".nuxt",
    "bower_components",
    ".expo",
    "target",
    ".tox",
    ".pytest_cache",
    "vendor",
];

/// Entries whose joint presence marks a directory as the server's own source
/// tree.  This is a heuristic: four or more hits trip the detector.
const SELF_SIGNATURE_ENTRIES: [&str; 6] = [
    "Cargo.toml",
    "src/main.rs",
    "crates/conduit-model",
    "crates/conduit-context",
    "crates/conduit-tools",
    "crates/conduit-mcp",
];

const SELF_SIGNATURE_THRESHOLD: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error(
        "relative paths are not supported; provide an absolute path (received: {0})"
    )]
    RelativePath(String),

    #[error("path outside workspace root: {path} (workspace root: {root})")]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    #[error(
        "refusing to read the user home directory root: {0}; \
         pass a specific project subdirectory instead"
    )]
    HomeRoot(PathBuf),

    #[error("refusing to read the server's own source directory: {0}")]
    SelfIngestion(PathBuf),
}

/// Path policy for one server process.
#[derive(Debug, Clone)]
pub struct Sandbox {
    workspace_root: PathBuf,
    container_root: Option<PathBuf>,
    user_home: Option<PathBuf>,
}

impl Sandbox {
    /// `workspace_root` must already be absolute and canonical (the config
    /// loader guarantees this).
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            container_root: None,
            user_home: None,
        }
    }

    /// Enable container path translation: paths under `container_root` are
    /// rewritten onto the workspace root before validation.
    pub fn with_container_root(mut self, container_root: Option<PathBuf>) -> Self {
        self.container_root = container_root;
        self
    }

    /// Explicit user home (overrides platform detection).
    pub fn with_user_home(mut self, user_home: Option<PathBuf>) -> Self {
        self.user_home = user_home;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Rewrite a container-side prefix onto the workspace root.  Paths that
    /// do not start with the configured prefix pass through unchanged.
    pub fn translate(&self, path: &Path) -> PathBuf {
        if let Some(container) = &self.container_root {
            if let Ok(rest) = path.strip_prefix(container) {
                return self.workspace_root.join(rest);
            }
        }
        path.to_path_buf()
    }

    /// Validate and resolve one externally supplied path.
    pub fn resolve(&self, path_str: &str) -> Result<PathBuf, SandboxError> {
        let raw = PathBuf::from(path_str);
        if !raw.is_absolute() {
            return Err(SandboxError::RelativePath(path_str.to_string()));
        }

        let translated = self.translate(&raw);

        // Canonicalize when the path exists so symlinks cannot smuggle a
        // target out of the workspace; fall back to lexical normalization
        // for paths that do not exist yet (they still must *lie* inside).
        let resolved = match std::fs::canonicalize(&translated) {
            Ok(p) => p,
            Err(_) => normalize_lexically(&translated),
        };

        if !resolved.starts_with(&self.workspace_root) {
            return Err(SandboxError::OutsideWorkspace {
                path: raw,
                root: self.workspace_root.clone(),
            });
        }

        if self.is_home_directory_root(&resolved) {
            return Err(SandboxError::HomeRoot(resolved));
        }

        // Walk from the workspace root down to the target, refusing paths
        // that pass through the server's own source tree.
        let mut cursor = resolved.clone();
        loop {
            if is_self_directory(&cursor) {
                return Err(SandboxError::SelfIngestion(cursor));
            }
            if cursor == self.workspace_root {
                break;
            }
            match cursor.parent() {
                Some(parent) => cursor = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(resolved)
    }

    /// True for the user home directory itself (never its subdirectories).
    ///
    /// Matches the configured/detected home plus the conventional layouts of
    /// the common OS families: `/home/<user>`, `/Users/<user>`, and
    /// `C:\Users\<user>`.
    pub fn is_home_directory_root(&self, path: &Path) -> bool {
        let home = self.user_home.clone().or_else(dirs::home_dir);
        if let Some(home) = home {
            if path == home {
                return true;
            }
        }

        let text = path.to_string_lossy().replace('\\', "/");
        let trimmed = text.trim_end_matches('/');
        let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [root, _user] if *root == "home" || *root == "Users" => true,
            [drive, users, _user]
                if drive.ends_with(':') && users.eq_ignore_ascii_case("users") =>
            {
                true
            }
            _ => false,
        }
    }
}

/// Detect the server's own source tree by signature entries.
///
/// A heuristic by design: a directory containing at least
/// [`SELF_SIGNATURE_THRESHOLD`] of the known entries is treated as the
/// server checkout and refused.
pub fn is_self_directory(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let hits = SELF_SIGNATURE_ENTRIES
        .iter()
        .filter(|entry| dir.join(entry).exists())
        .count();
    hits >= SELF_SIGNATURE_THRESHOLD
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_in(dir: &Path) -> Sandbox {
        Sandbox::new(std::fs::canonicalize(dir).unwrap())
    }

    #[test]
    fn relative_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        let err = sb.resolve("relative/file.txt").unwrap_err();
        assert!(matches!(err, SandboxError::RelativePath(_)));
        assert!(err.to_string().contains("relative/file.txt"));
    }

    #[test]
    fn paths_inside_workspace_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let sb = sandbox_in(dir.path());
        let resolved = sb.resolve(&file.to_string_lossy()).unwrap();
        assert!(resolved.ends_with("a.txt"));
    }

    #[test]
    fn paths_outside_workspace_are_rejected() {
        let inside = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let file = outside.path().join("b.txt");
        std::fs::write(&file, "x").unwrap();
        let sb = sandbox_in(inside.path());
        let err = sb.resolve(&file.to_string_lossy()).unwrap_err();
        assert!(matches!(err, SandboxError::OutsideWorkspace { .. }));
    }

    #[test]
    fn dotdot_cannot_escape_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        let sneaky = format!("{}/../../../etc/passwd", dir.path().display());
        let err = sb.resolve(&sneaky).unwrap_err();
        assert!(matches!(err, SandboxError::OutsideWorkspace { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let inside = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("secret.txt");
        std::fs::write(&target, "x").unwrap();
        let link = inside.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let sb = sandbox_in(inside.path());
        let err = sb.resolve(&link.to_string_lossy()).unwrap_err();
        assert!(matches!(err, SandboxError::OutsideWorkspace { .. }));
    }

    #[test]
    fn container_prefix_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.txt"), "x").unwrap();
        let sb = sandbox_in(dir.path())
            .with_container_root(Some(PathBuf::from("/workspace")));
        let resolved = sb.resolve("/workspace/c.txt").unwrap();
        assert!(resolved.ends_with("c.txt"));
        assert!(resolved.starts_with(sb.workspace_root()));
    }

    #[test]
    fn home_directory_root_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path());
        for home in ["/home/ubuntu", "/home/testuser", "/Users/john"] {
            assert!(sb.is_home_directory_root(Path::new(home)), "{home}");
        }
        assert!(sb.is_home_directory_root(Path::new("C:\\Users\\John")));
        assert!(sb.is_home_directory_root(Path::new("C:/Users/Jane")));
        for sub in [
            "/home/ubuntu/projects",
            "/Users/john/Documents",
            "C:\\Users\\John\\Documents",
        ] {
            assert!(!sb.is_home_directory_root(Path::new(sub)), "{sub}");
        }
    }

    #[test]
    fn explicit_home_override_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let sb = sandbox_in(dir.path())
            .with_user_home(Some(PathBuf::from("/srv/custom-home")));
        assert!(sb.is_home_directory_root(Path::new("/srv/custom-home")));
        assert!(!sb.is_home_directory_root(Path::new("/srv/custom-home/project")));
    }

    #[test]
    fn self_directory_detection_needs_four_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::create_dir_all(root.join("crates/conduit-model")).unwrap();
        assert!(!is_self_directory(root), "three signatures are not enough");

        std::fs::create_dir_all(root.join("crates/conduit-tools")).unwrap();
        assert!(is_self_directory(root), "four signatures trip the detector");
    }

    #[test]
    fn self_directory_is_refused_by_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let server = root.join("server");
        std::fs::create_dir_all(server.join("src")).unwrap();
        std::fs::create_dir_all(server.join("crates/conduit-model")).unwrap();
        std::fs::create_dir_all(server.join("crates/conduit-tools")).unwrap();
        std::fs::write(server.join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(server.join("src/main.rs"), "fn main() {}").unwrap();

        let sb = sandbox_in(root);
        let inner = server.join("src/main.rs");
        let err = sb.resolve(&inner.to_string_lossy()).unwrap_err();
        assert!(matches!(err, SandboxError::SelfIngestion(_)));

        // A sibling project in the same workspace is unaffected.
        let project = root.join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("lib.rs"), "x").unwrap();
        assert!(sb.resolve(&project.join("lib.rs").to_string_lossy()).is_ok());
    }
}
