//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async production code in relay-core and relay-daemon MUST NOT
//! use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::process`, not
//! `std::fs`, `std::net` sockets, `std::process`.

use architectural_enforcement::{scan_directory, workspace_root};

/// Production source trees that run on the tokio runtime
const PRODUCTION_DIRS: &[&str] = &["relay/core/src", "relay/daemon/src"];

#[test]
fn test_no_blocking_io_in_production_code() {
    let root = workspace_root();
    let violations: Vec<_> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| scan_directory(&root.join(dir)))
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await, tokio::fs::write().await");
        eprintln!("  - tokio::net::TcpListener::bind().await");
        eprintln!("  - tokio::process::Command::output().await");
        eprintln!("  - reqwest::Client (async)");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (configuration loading before serving)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_production_dirs_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_DIRS {
        assert!(
            root.join(dir).is_dir(),
            "expected production source directory {dir}"
        );
    }
}
