//! Architectural Enforcement
//!
//! Source scanners used by the integration tests in this package to keep
//! production code honest:
//! - No blocking file, socket or process I/O inside async functions
//! - No blocking HTTP client
//!
//! The scanners are line-based. They work the way a person reading the code would:
//! find the enclosing function, decide whether it is async, and report the
//! offending line. Everything after the first `#[cfg(test)]` in a file is
//! test code and is not checked.

use std::fs;
use std::path::{Path, PathBuf};

/// Blocking calls that must not appear in async production code
pub const BLOCKING_PATTERNS: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("use std::fs", "Blocking file I/O"),
    ("std::net::TcpStream", "Blocking network I/O"),
    ("std::net::TcpListener", "Blocking network I/O"),
    ("std::net::UdpSocket", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::thread::sleep", "Blocking sleep"),
];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What kind of blocking call it is
    pub kind: &'static str,
    /// The trimmed source line
    pub source: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.kind,
            self.source
        )
    }
}

/// Workspace root, resolved from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Scan every `.rs` file below `dir`
#[must_use]
pub fn scan_directory(dir: &Path) -> Vec<Violation> {
    let mut violations = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(entry.path()) {
            violations.extend(scan_source(entry.path(), &content));
        }
    }
    violations
}

/// Scan one file's source text
#[must_use]
pub fn scan_source(path: &Path, content: &str) -> Vec<Violation> {
    let lines: Vec<&str> = content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
        .collect();

    let mut violations = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let code = line.split("//").next().unwrap_or(line);
        let Some((_, kind)) = BLOCKING_PATTERNS
            .iter()
            .find(|(pattern, _)| code.contains(pattern))
        else {
            continue;
        };

        if !is_in_async_function(&lines, idx) {
            continue;
        }

        violations.push(Violation {
            path: path.to_path_buf(),
            line: idx + 1,
            kind,
            source: line.trim().to_string(),
        });
    }
    violations
}

/// Whether the line declares a function (any visibility)
#[must_use]
pub fn is_fn_declaration(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("fn ") || line.contains(" fn ")
}

/// Whether `current_idx` sits inside an async function.
///
/// Top-level `use` lines count as async context so that importing blocking
/// APIs into a module is reported once at the import.
#[must_use]
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    if lines[current_idx].trim_start().starts_with("use ") {
        return true;
    }

    for line in lines[..=current_idx].iter().rev() {
        let line = line.trim();
        if is_fn_declaration(line) {
            return line.contains("async fn ");
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_blocking_call_in_async_fn() {
        let src = "pub async fn load() {\n    let s = std::fs::read_to_string(\"a\");\n}\n";
        let violations = scan_source(Path::new("a.rs"), src);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
        assert_eq!(violations[0].kind, "Blocking file I/O");
    }

    #[test]
    fn test_sync_fn_is_allowed() {
        let src = "pub fn load() {\n    let s = std::fs::read_to_string(\"a\");\n}\n";
        assert!(scan_source(Path::new("a.rs"), src).is_empty());
    }

    #[test]
    fn test_socket_addr_is_not_io() {
        let src = "use std::net::SocketAddr;\nasync fn run(addr: SocketAddr) {}\n";
        assert!(scan_source(Path::new("a.rs"), src).is_empty());
    }

    #[test]
    fn test_blocking_import_is_reported() {
        let src = "use std::fs;\n\nasync fn run() {}\n";
        assert_eq!(scan_source(Path::new("a.rs"), src).len(), 1);
    }

    #[test]
    fn test_test_module_is_skipped() {
        let src = "fn ok() {}\n#[cfg(test)]\nmod tests {\n    async fn t() { std::fs::write(\"a\", \"b\"); }\n}\n";
        assert!(scan_source(Path::new("a.rs"), src).is_empty());
    }

    #[test]
    fn test_comments_are_ignored() {
        let src = "async fn run() {\n    // std::fs::read is not used here\n}\n";
        assert!(scan_source(Path::new("a.rs"), src).is_empty());
    }
}
