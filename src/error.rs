//! Error types for primeray.

use thiserror::Error;

/// Everything that can go wrong between a decimal string and a verdict.
///
/// Setup failures (`DeviceUnavailable`, `DeviceSetup`, `KernelBuild`) are
/// fatal at process start. `DeviceTimeout` and `Cancelled` are per-test and
/// recoverable by the caller. `CapacityExceeded` is an error, never a
/// verdict: an oversized candidate is undetermined, not composite, and
/// there is no CPU fallback.
#[derive(Debug, Error)]
pub enum TesterError {
    #[error("invalid input: {0}")]
    Parse(String),

    #[error("candidate needs {bits} bits but the device encoding holds at most {max} bits")]
    CapacityExceeded { bits: u64, max: u64 },

    #[error("candidate not suitable for witness testing: {0}")]
    InvalidCandidate(String),

    #[error("no compute-capable device: {0}")]
    DeviceUnavailable(String),

    #[error("device setup failed: {0}")]
    DeviceSetup(String),

    #[error("compute kernel rejected by the driver: {0}")]
    KernelBuild(String),

    #[error("device dispatch exceeded the {limit_ms} ms deadline (waited {waited_ms} ms)")]
    DeviceTimeout { waited_ms: u64, limit_ms: u64 },

    #[error("test cancelled after {rounds_completed} completed rounds")]
    Cancelled { rounds_completed: u32 },
}

pub type Result<T> = std::result::Result<T, TesterError>;
