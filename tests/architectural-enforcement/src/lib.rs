//! Architectural Enforcement Integration Tests
//!
//! Source-scanning checks that keep production code honest:
//! - No sleep() calls; sessions wait on I/O, never on timers
//! - No blocking HTTP or filesystem I/O inside async functions
//!
//! The scanning helpers live here; the rules live in `tests/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["promptdeck/core/src", "promptdeck/cli/src"];

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// A rule violation at a source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line_number: usize,
    pub line: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}",
            self.path.display(),
            self.line_number,
            self.line.trim()
        )
    }
}

/// Every `.rs` file under `dir`
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Code part of a line, with any trailing `//` comment removed
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Index of the line that starts the `#[cfg(test)]` module, if any
#[must_use]
pub fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|l| l.trim() == "#[cfg(test)]")
}

/// Whether the line at `current_idx` sits inside an `async fn`
#[must_use]
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for line in lines[..current_idx].iter().rev() {
        let line = line.trim();

        if line.contains("async fn ") {
            return true;
        }
        if line.contains("fn ") {
            return false;
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Scan production code, reporting lines where `is_violation` holds.
///
/// Test modules are skipped.
pub fn scan_production_code(
    is_violation: impl Fn(&[&str], usize, &str) -> bool,
) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_files(&root.join(dir)) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();
            let end = test_module_start(&lines).unwrap_or(lines.len());

            for (idx, line) in lines[..end].iter().enumerate() {
                let code = code_part(line);
                if code.trim_start().starts_with("//") || code.trim().is_empty() {
                    continue;
                }
                if is_violation(&lines, idx, code) {
                    violations.push(Violation {
                        path: path.clone(),
                        line_number: idx + 1,
                        line: (*line).to_string(),
                    });
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(1)"), "let x = 1; ");
        assert_eq!(code_part("/// docs"), "");
    }

    #[test]
    fn test_async_detection() {
        let lines = vec![
            "async fn fetch() {",
            "    let body = read();",
            "}",
            "fn load() {",
            "    let body = read();",
            "}",
        ];
        assert!(is_in_async_function(&lines, 1));
        assert!(!is_in_async_function(&lines, 4));
    }

    #[test]
    fn test_production_dirs_exist() {
        for dir in PRODUCTION_DIRS {
            assert!(
                workspace_root().join(dir).exists(),
                "missing production dir {dir}"
            );
        }
    }
}
