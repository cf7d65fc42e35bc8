//! Integration Test: Blocking Call Prohibition
//!
//! **Policy**: The viewer worker, button dispatch and shutdown sequence all
//! run on the tokio runtime. Production code MUST NOT block a runtime thread.
//! **Exceptions**: Test code; synchronous config loading before the runtime
//! has any work (`std::fs` is not checked).

use architectural_enforcement::find_violations;

fn report(kind: &str, violations: &[architectural_enforcement::Violation], advice: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ CRITICAL: {kind} found in production code!\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n✅ Use instead:");
    for line in advice {
        eprintln!("  - {line}");
    }

    panic!(
        "\nFound {} {kind} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

/// Frame pacing and the shutdown delay must use the runtime's timer
#[test]
fn test_no_thread_sleep_in_production_code() {
    let violations = find_violations(&["thread::sleep("]);
    report(
        "Thread sleeps",
        &violations,
        &[
            "tokio::time::sleep(..).await (paced loops, delays)",
            "CancellationToken::cancelled() to wait for a stop request",
        ],
    );
}

#[test]
fn test_no_blocking_http_in_production_code() {
    let violations = find_violations(&["reqwest::blocking", "ureq::"]);
    report(
        "Blocking HTTP calls",
        &violations,
        &["reqwest::Client with .send().await"],
    );
}

#[test]
fn test_no_blocking_process_spawn_in_production_code() {
    let violations = find_violations(&["std::process::Command"]);
    report(
        "Blocking process spawns",
        &violations,
        &["tokio::process::Command with .status().await"],
    );
}

/// Waiting on a std primitive inside async code parks the worker thread
#[test]
fn test_no_std_sync_waits_in_production_code() {
    let violations = find_violations(&[
        "std::sync::Barrier",
        "std::sync::Condvar",
        ".recv_timeout(",
    ]);
    report(
        "Blocking synchronization",
        &violations,
        &[
            "tokio::sync::Barrier for the shutdown rendezvous",
            "tokio::sync::oneshot for worker completion",
        ],
    );
}
