//! # Main — CLI Entry Point
//!
//! Routes CLI subcommands to the execution functions in `cli` and handles
//! the shared concerns: environment loading, structured logging, argument
//! parsing, and exit codes.
//!
//! ## Subcommands
//!
//! One per operating mode: `kernel` dumps the embedded WGSL source, `test`
//! checks one number, `random` and `huge` generate and test candidates by
//! digit count, `batch` aggregates repeated huge tests, and `info` lists
//! compute adapters.
//!
//! ## Global Options
//!
//! - `--rounds`: Miller-Rabin witness rounds per test (default 64).
//! - `--backend` / `--device`: compute backend and adapter selection.
//! - `--timeout-secs`: per-dispatch deadline.
//! - `--seed` / `PRIMERAY_SEED`: deterministic candidates and witness pools.
//! - `--json`: machine-readable results on stdout.
//! - `--quiet`: suppress the progress bar.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use primeray::gpu::GpuBackend;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "primeray", version, about = "GPU-offloaded Miller-Rabin primality testing")]
struct Cli {
    /// Miller-Rabin witness rounds per test (higher = more certain but slower)
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: u32,

    /// Compute backend (auto tries hardware backends before software ones)
    #[arg(long, value_enum, default_value_t = GpuBackend::Auto)]
    backend: GpuBackend,

    /// Adapter index when several devices share a backend
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Deadline in seconds for any single dispatch
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Seed for candidate generation and witness pools (random when unset)
    #[arg(long, env = "PRIMERAY_SEED")]
    seed: Option<u64>,

    /// Emit machine-readable JSON results on stdout
    #[arg(long)]
    json: bool,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the embedded WGSL compute kernel and exit
    Kernel,
    /// Test whether the given decimal number is prime
    Test {
        /// Decimal candidate
        number: String,
    },
    /// Generate and test a random number with the given digit count
    Random {
        /// Decimal digit count
        digits: u32,
    },
    /// Generate and test a random number with 10^exponent digits
    Huge {
        /// Digit-count exponent (1 to 6)
        exponent: u32,
    },
    /// Generate and test a series of numbers with 10^exponent digits each
    Batch {
        /// Digit-count exponent (1 to 6)
        exponent: u32,
        /// How many candidates to test
        count: u64,
    },
    /// Show compute adapters and their limits
    Info,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize structured logging: LOG_FORMAT=json for machine consumption,
    // human-readable otherwise. Both go to stderr so stdout stays parseable.
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    // --help and --version print to stdout and exit 0; argument errors exit 1
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            std::process::exit(code);
        }
    };

    match &cli.command {
        Commands::Kernel => cli::run_kernel(),
        Commands::Test { number } => cli::run_test(&cli, number),
        Commands::Random { digits } => cli::run_random(&cli, *digits),
        Commands::Huge { exponent } => cli::run_huge(&cli, *exponent),
        Commands::Batch { exponent, count } => cli::run_batch(&cli, *exponent, *count),
        Commands::Info => cli::run_info(&cli),
    }
}
