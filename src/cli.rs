//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic for each subcommand: device setup, candidate generation,
//! test orchestration, and result reporting. Human-readable results go to
//! stdout; the progress bar and structured logs go to stderr so stdout
//! stays parseable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use primeray::gpu::{DeviceRoundRunner, GpuContext, ProgressFn, RunnerConfig, KERNEL_SOURCE};
use primeray::tester::PrimalityTester;
use primeray::{candidate, exact_digits};

use super::Cli;

// ── Device Setup ────────────────────────────────────────────────

/// Standard progress bar style for witness-round progress.
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rounds ({eta})")
        .expect("invalid progress bar template")
        .progress_chars("#>-")
}

/// Progress bar for interactive runs; hidden under `--quiet` and `--json`.
fn make_bar(cli: &Cli) -> ProgressBar {
    if cli.quiet || cli.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(u64::from(cli.rounds));
        bar.set_style(progress_style());
        bar
    }
}

/// Open the compute device and wrap it in a tester, wiring the progress
/// bar into the runner's reporter thread.
fn build_tester(cli: &Cli, bar: &ProgressBar) -> Result<PrimalityTester> {
    let ctx = pollster::block_on(GpuContext::new(cli.device, cli.backend))
        .context("failed to open a compute device")?;
    info!(
        device = ctx.device_name(),
        backend = ?ctx.backend(),
        "compute device ready"
    );

    let config = RunnerConfig {
        dispatch_timeout: Duration::from_secs(cli.timeout_secs),
        ..RunnerConfig::default()
    };
    let sink = bar.clone();
    let progress: ProgressFn = Arc::new(move |snapshot| {
        sink.set_length(u64::from(snapshot.total));
        sink.set_position(u64::from(snapshot.completed));
    });
    let runner = DeviceRoundRunner::new(ctx, config)?.with_progress(progress);

    let seed = cli.seed.unwrap_or_else(rand::random);
    Ok(PrimalityTester::new(Box::new(runner), seed))
}

/// Run one timed test, clearing the bar whether the run succeeds or not.
fn timed_is_prime(
    tester: &mut PrimalityTester,
    bar: &ProgressBar,
    rounds: u32,
) -> Result<(bool, f64)> {
    bar.reset();
    let started = Instant::now();
    let outcome = tester.is_prime(rounds);
    let elapsed = started.elapsed().as_secs_f64();
    bar.finish_and_clear();
    Ok((outcome?, elapsed))
}

// ── Result Reporting ────────────────────────────────────────────

#[derive(Serialize)]
struct TestReport {
    digits: u64,
    rounds: u32,
    probably_prime: bool,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct BatchReport {
    exponent: u32,
    count: u64,
    probable_primes: u64,
    prime_density_pct: f64,
    total_secs: f64,
    mean_secs: f64,
    results: Vec<TestReport>,
}

fn verdict_label(probably_prime: bool) -> &'static str {
    if probably_prime {
        "PROBABLY PRIME"
    } else {
        "COMPOSITE"
    }
}

/// Print one test result, as JSON when requested.
fn report_result(cli: &Cli, digits: u64, probably_prime: bool, elapsed_secs: f64) -> Result<()> {
    if cli.json {
        let report = TestReport {
            digits,
            rounds: cli.rounds,
            probably_prime,
            elapsed_secs,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("Result: {}", verdict_label(probably_prime));
        println!("Time taken: {elapsed_secs:.3} seconds");
    }
    Ok(())
}

/// Print a candidate, eliding the middle of anything over 100 digits.
fn print_candidate(decimal: &str) {
    if decimal.len() <= 100 {
        println!("Number: {decimal}");
    } else {
        println!("First 50 digits: {}...", &decimal[..50]);
        println!("Last 50 digits: ...{}", &decimal[decimal.len() - 50..]);
    }
}

// ── Subcommand Execution ────────────────────────────────────────

/// `kernel`: dump the embedded WGSL compute kernel to stdout.
pub fn run_kernel() -> Result<()> {
    print!("{KERNEL_SOURCE}");
    Ok(())
}

/// `test`: test one decimal candidate.
pub fn run_test(cli: &Cli, number: &str) -> Result<()> {
    let n = candidate::parse_candidate(number)?;
    let digits = exact_digits(&n);
    if !cli.json {
        println!("Testing primality of: {n}");
        println!("Number of digits: {digits}");
    }

    let bar = make_bar(cli);
    let mut tester = build_tester(cli, &bar)?;
    tester.set_candidate(n);

    let (probably_prime, elapsed_secs) = timed_is_prime(&mut tester, &bar, cli.rounds)?;
    report_result(cli, digits, probably_prime, elapsed_secs)
}

/// `random`: generate a random candidate with the given digit count.
pub fn run_random(cli: &Cli, digits: u32) -> Result<()> {
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = candidate::seeded_rng(seed);
    let n = candidate::random_with_digits(digits, &mut rng)?;

    if !cli.json {
        println!("Generated random number with {digits} digits");
        print_candidate(&n.to_string());
    }

    let bar = make_bar(cli);
    let mut tester = build_tester(cli, &bar)?;
    tester.set_candidate(n);

    let (probably_prime, elapsed_secs) = timed_is_prime(&mut tester, &bar, cli.rounds)?;
    report_result(cli, u64::from(digits), probably_prime, elapsed_secs)
}

/// `huge`: generate and test a candidate with 10^exponent digits.
pub fn run_huge(cli: &Cli, exponent: u32) -> Result<()> {
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = candidate::seeded_rng(seed);

    if !cli.json {
        println!("Generating a random number around 10^10^{exponent}");
    }
    let gen_started = Instant::now();
    let n = candidate::huge_candidate(exponent, &mut rng)?;
    let decimal = n.to_string();
    let digits = decimal.len() as u64;
    if !cli.json {
        println!("Generated a number with {digits} digits");
        println!(
            "Generation time: {:.3} seconds",
            gen_started.elapsed().as_secs_f64()
        );
        print_candidate(&decimal);
    }

    let bar = make_bar(cli);
    let mut tester = build_tester(cli, &bar)?;
    tester.set_candidate(n);

    let (probably_prime, elapsed_secs) = timed_is_prime(&mut tester, &bar, cli.rounds)?;
    report_result(cli, digits, probably_prime, elapsed_secs)
}

/// `batch`: repeat `huge` `count` times and report aggregate statistics.
pub fn run_batch(cli: &Cli, exponent: u32, count: u64) -> Result<()> {
    if exponent == 0 || exponent > candidate::MAX_HUGE_EXPONENT {
        bail!(
            "exponent must be between 1 and {}",
            candidate::MAX_HUGE_EXPONENT
        );
    }
    if count == 0 {
        bail!("count must be at least 1");
    }

    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = candidate::seeded_rng(seed);
    let bar = make_bar(cli);
    let mut tester = build_tester(cli, &bar)?;

    if !cli.json {
        println!("Testing {count} random numbers around 10^10^{exponent}");
    }

    let mut probable_primes: u64 = 0;
    let mut total_secs = 0.0;
    let mut results = Vec::new();

    for i in 0..count {
        if !cli.json {
            println!("\n[{}/{count}] Generating number...", i + 1);
        }
        let n = candidate::huge_candidate(exponent, &mut rng)?;
        let digits = exact_digits(&n);
        if !cli.json {
            println!("Testing number with {digits} digits");
        }
        tester.set_candidate(n);

        let (probably_prime, elapsed_secs) = timed_is_prime(&mut tester, &bar, cli.rounds)?;
        total_secs += elapsed_secs;
        if probably_prime {
            probable_primes += 1;
        }

        if cli.json {
            results.push(TestReport {
                digits,
                rounds: cli.rounds,
                probably_prime,
                elapsed_secs,
            });
        } else {
            let tested = i + 1;
            let density = 100.0 * probable_primes as f64 / tested as f64;
            println!("Result: {}", verdict_label(probably_prime));
            println!("Time taken: {elapsed_secs:.3} seconds");
            println!("Running stats: {probable_primes}/{tested} primes found ({density:.2}%)");
            println!(
                "Average time per test: {:.3} seconds",
                total_secs / tested as f64
            );
        }
    }

    if cli.json {
        let report = BatchReport {
            exponent,
            count,
            probable_primes,
            prime_density_pct: 100.0 * probable_primes as f64 / count as f64,
            total_secs,
            mean_secs: total_secs / count as f64,
            results,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("\nFinal results:");
        println!("Tested {count} numbers around 10^10^{exponent}");
        println!("Found {probable_primes} probable primes");
        println!(
            "Prime density: {:.2}%",
            100.0 * probable_primes as f64 / count as f64
        );
        println!("Total time: {total_secs:.3} seconds");
        println!(
            "Average time per test: {:.3} seconds",
            total_secs / count as f64
        );
    }
    Ok(())
}

/// `info`: list visible compute adapters and their limits.
pub fn run_info(cli: &Cli) -> Result<()> {
    let adapters = pollster::block_on(GpuContext::describe_adapters(cli.backend))?;
    if cli.json {
        println!("{}", serde_json::to_string(&adapters)?);
        return Ok(());
    }

    for adapter in &adapters {
        println!("[{}] {}", adapter.index, adapter.name);
        println!("    Backend: {}", adapter.backend);
        println!("    Type: {}", adapter.device_type);
        if !adapter.driver.is_empty() {
            println!("    Driver: {}", adapter.driver);
        }
        println!("    Max workgroup size: {}", adapter.max_workgroup_size);
        println!(
            "    Max workgroups per dimension: {}",
            adapter.max_workgroups_per_dimension
        );
    }
    Ok(())
}
