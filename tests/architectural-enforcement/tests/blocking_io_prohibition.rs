//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: No blocking HTTP anywhere, and no blocking filesystem or
//! network calls inside `async fn`. Config loading runs before any session
//! starts and may use `std::fs` from plain functions.

use architectural_enforcement::{is_in_async_function, scan_production_code};

#[test]
fn test_no_blocking_http_client() {
    let violations = scan_production_code(|_, _, code| code.contains("reqwest::blocking"));

    assert!(
        violations.is_empty(),
        "reqwest::blocking used in production code:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_no_blocking_io_in_async_functions() {
    let violations = scan_production_code(|lines, idx, code| {
        let blocking = code.contains("std::fs::")
            || code.contains("std::net::")
            || code.contains("std::io::stdin()")
            || code.contains("std::process::Command");
        blocking && is_in_async_function(lines, idx)
    });

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O inside async functions:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs / tokio::io / tokio::net instead.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}
