//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Sessions advance
//! only when the server sends bytes or the user cancels; timeouts belong to
//! the HTTP client or `tokio::time::timeout`.

use architectural_enforcement::scan_production_code;

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan_production_code(|_, _, code| {
        code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
    });

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nWait on I/O instead (select! on the stream and a cancellation token).");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}
