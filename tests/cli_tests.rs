//! CLI integration tests using assert_cmd.
//!
//! Everything here runs without a GPU: help output, argument validation,
//! and the `kernel` dump. Subcommands that open a device are exercised by
//! the unit suites through the runner seam instead.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn primeray() -> Command {
    Command::cargo_bin("primeray").unwrap()
}

// --- Help and version ---

#[test]
fn help_shows_all_subcommands() {
    primeray().arg("--help").assert().success().stdout(
        predicate::str::contains("kernel")
            .and(predicate::str::contains("test"))
            .and(predicate::str::contains("random"))
            .and(predicate::str::contains("huge"))
            .and(predicate::str::contains("batch"))
            .and(predicate::str::contains("info")),
    );
}

#[test]
fn help_shows_global_options() {
    primeray().arg("--help").assert().success().stdout(
        predicate::str::contains("--rounds")
            .and(predicate::str::contains("--backend"))
            .and(predicate::str::contains("--device"))
            .and(predicate::str::contains("--timeout-secs"))
            .and(predicate::str::contains("--seed"))
            .and(predicate::str::contains("--json"))
            .and(predicate::str::contains("--quiet")),
    );
}

#[test]
fn help_test_shows_candidate_arg() {
    primeray()
        .args(["test", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<NUMBER>"));
}

#[test]
fn version_prints_package_name() {
    primeray()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("primeray"));
}

// --- Kernel dump (no device needed) ---

#[test]
fn kernel_dumps_wgsl_source() {
    primeray().arg("kernel").assert().success().stdout(
        predicate::str::contains("@compute")
            .and(predicate::str::contains("fn main"))
            .and(predicate::str::contains("fn mont_mul"))
            .and(predicate::str::contains("override WORKGROUP_SIZE")),
    );
}

// --- Argument validation (exit code 1, message on stderr) ---

#[test]
fn unknown_subcommand_fails() {
    primeray()
        .arg("nonexistent")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_missing_number_fails() {
    primeray()
        .arg("test")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("required arguments"));
}

#[test]
fn zero_rounds_rejected_by_parser() {
    primeray()
        .args(["--rounds", "0", "kernel"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn malformed_candidate_fails_before_device_setup() {
    primeray()
        .args(["test", "12a3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn negative_candidate_fails() {
    primeray()
        .args(["test", "--", "-17"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn oversized_huge_exponent_fails() {
    primeray()
        .args(["huge", "9"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("huge exponent"));
}

#[test]
fn batch_exponent_out_of_range_fails() {
    primeray()
        .args(["batch", "0", "5"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("exponent must be between"));
}

#[test]
fn batch_zero_count_fails() {
    primeray()
        .args(["batch", "3", "0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("count must be at least 1"));
}
