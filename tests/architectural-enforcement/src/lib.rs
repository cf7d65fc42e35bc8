//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No thread-blocking sleeps in async code
//! - No blocking HTTP or process calls on the runtime
//!
//! The helpers here scan the production sources of the ticker crates; test
//! modules (everything after `#[cfg(test)]`) are skipped.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["ticker/core/src", "ticker/daemon/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The trimmed source line
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this package
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under the production roots
#[must_use]
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.exists())
        .flat_map(|dir| {
            walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(walkdir::DirEntry::into_path)
        })
        .collect()
}

/// Lines of production code containing any of `patterns`
///
/// Comments and `#[cfg(test)]` modules are ignored.
#[must_use]
pub fn find_violations(patterns: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for path in production_sources() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        violations.extend(scan_source(&path, &content, patterns));
    }
    violations
}

/// Scan one file's contents
#[must_use]
pub fn scan_source(path: &Path, content: &str, patterns: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);
        if patterns.iter().any(|p| code_part.contains(p)) {
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                text: line.trim().to_string(),
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_skips_comments_and_test_modules() {
        let source = "\
fn a() {
    std::thread::sleep(d); // bad
    // std::thread::sleep(d);
}
#[cfg(test)]
mod tests {
    fn b() { std::thread::sleep(d); }
}
";
        let found = scan_source(Path::new("x.rs"), source, &["thread::sleep("]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 2);
    }

    #[test]
    fn test_production_sources_found() {
        let sources = production_sources();
        assert!(sources.iter().any(|p| p.ends_with("viewer.rs")));
        assert!(sources.iter().any(|p| p.ends_with("main.rs")));
    }
}
