//! Device-side execution: context discovery, the witness compute
//! pipeline, and the sliced dispatch runner.

pub mod context;
pub mod pipeline;
pub mod runner;

pub use context::{AdapterSummary, GpuBackend, GpuContext};
pub use pipeline::{WitnessPipeline, KERNEL_SOURCE, WORKGROUP_SIZE};
pub use runner::{
    CancelToken, DeviceRoundRunner, ProgressFn, ProgressSnapshot, RoundRunner, RunOutcome,
    RunnerConfig, Verdict,
};
