//! # Device Round Runner
//!
//! Drives one witness test to a verdict. The round budget executes as a
//! sequence of bounded dispatch slices rather than a single submission:
//! storage buffers cannot be mapped while a dispatch is in flight, so
//! progress is observed by reading the result cell back after each slice.
//! Slices also keep individual dispatches short enough that a driver
//! watchdog never fires, and give the host a place to honor cancellation
//! and the per-dispatch deadline.
//!
//! Progress reporting runs on its own thread fed by a channel. The main
//! thread pushes a snapshot after every slice; the reporter re-renders on
//! a fixed cadence between snapshots and exits on the first terminal one
//! (composite found, or all rounds complete).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::pipeline::{WitnessPipeline, WORKGROUP_SIZE};
use super::GpuContext;
use crate::error::{Result, TesterError};
use crate::params::WitnessParameters;
use crate::schedule;

/// Size of the result cell: two u32 words, composite flag then counter.
const RESULT_BYTES: u64 = 8;

/// Final answer of a witness test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    ProbablyPrime,
    Composite,
}

impl Verdict {
    pub fn is_probably_prime(self) -> bool {
        matches!(self, Verdict::ProbablyPrime)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::ProbablyPrime => write!(f, "PROBABLY PRIME"),
            Verdict::Composite => write!(f, "COMPOSITE"),
        }
    }
}

/// What one run produced.
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub verdict: Verdict,
    /// Rounds that finished with a pass; composite short-circuits leave
    /// the remainder unrun.
    pub rounds_completed: u32,
    pub elapsed: Duration,
}

/// Runner tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Rounds per dispatch slice. Smaller slices mean finer progress and
    /// shorter dispatches; larger slices mean more device parallelism.
    pub rounds_per_dispatch: u32,
    /// Cadence of the progress reporter.
    pub poll_interval: Duration,
    /// Deadline for any single dispatch to complete.
    pub dispatch_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rounds_per_dispatch: 8,
            poll_interval: Duration::from_millis(100),
            dispatch_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared flag checked between slices; flips a run into a clean abort.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One progress observation, pushed to the reporter after each slice.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub completed: u32,
    pub total: u32,
    pub composite: bool,
    pub done: bool,
}

impl ProgressSnapshot {
    pub fn is_terminal(self) -> bool {
        self.composite || self.done || self.completed >= self.total
    }

    pub fn percent(self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * f64::from(self.completed) / f64::from(self.total)
        }
    }
}

/// Progress consumer; cloned into the reporter thread per run.
pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Seam between the tester facade and the device. The facade only ever
/// dispatches through this trait, which is what lets tests count
/// dispatches with a mock.
pub trait RoundRunner {
    fn run(&mut self, params: &WitnessParameters) -> Result<RunOutcome>;
}

struct RunBuffers {
    uniform: wgpu::Buffer,
    result: wgpu::Buffer,
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    // held for the lifetime of the bind group
    _operands: wgpu::Buffer,
    _pool: wgpu::Buffer,
}

pub struct DeviceRoundRunner {
    ctx: GpuContext,
    pipeline: WitnessPipeline,
    config: RunnerConfig,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
}

impl DeviceRoundRunner {
    pub fn new(ctx: GpuContext, config: RunnerConfig) -> Result<Self> {
        let pipeline = WitnessPipeline::new(&ctx)?;
        Ok(Self {
            ctx,
            pipeline,
            config,
            cancel: CancelToken::new(),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle for aborting a run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn create_buffers(&self, params: &WitnessParameters) -> RunBuffers {
        let uniform = self.ctx.create_buffer::<crate::params::DispatchParams>(
            "witness-dispatch-params",
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            1,
        );
        let operands = self.ctx.create_buffer_init(
            "witness-operands",
            wgpu::BufferUsages::STORAGE,
            &[params.operands],
        );
        let pool = self.ctx.create_buffer_init(
            "witness-pool",
            wgpu::BufferUsages::STORAGE,
            &params.pool,
        );
        let result = self.ctx.create_buffer::<u32>(
            "witness-result",
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            2,
        );
        let staging = self.ctx.create_buffer::<u32>(
            "witness-staging",
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            2,
        );

        // the cell accumulates across slices; zero it once per test
        self.ctx.queue.write_buffer(&result, 0, &[0u8; 8]);

        let bind_group = self
            .ctx
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("witness-bind-group"),
                layout: &self.pipeline.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: operands.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: pool.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: result.as_entire_binding(),
                    },
                ],
            });

        RunBuffers {
            uniform,
            result,
            staging,
            bind_group,
            _operands: operands,
            _pool: pool,
        }
    }

    fn execute_slices(
        &self,
        params: &WitnessParameters,
        buffers: &RunBuffers,
        progress_tx: &mpsc::Sender<ProgressSnapshot>,
    ) -> Result<(u32, bool)> {
        let total = params.rounds;
        let mut completed = 0u32;
        let mut composite = false;
        let mut next = 0u32;

        // a slice must fit in a single dispatch along one dimension
        let max_slice = self
            .ctx
            .max_workgroups()
            .saturating_mul(WORKGROUP_SIZE)
            .max(1);

        while next < total && !composite {
            if self.cancel.is_cancelled() {
                return Err(TesterError::Cancelled {
                    rounds_completed: completed,
                });
            }

            let slice_len = (total - next)
                .min(self.config.rounds_per_dispatch)
                .min(max_slice);
            let workgroups = schedule::workgroups_for(slice_len, WORKGROUP_SIZE);
            let lane_count = workgroups * WORKGROUP_SIZE;

            self.ctx.queue.write_buffer(
                &buffers.uniform,
                0,
                bytemuck::bytes_of(&params.dispatch_params(next, slice_len, lane_count)),
            );

            debug!(slice_start = next, slice_len, workgroups, "dispatching witness slice");
            let mut encoder =
                self.ctx
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("witness-encoder"),
                    });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("witness-pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline.pipeline);
                pass.set_bind_group(0, &buffers.bind_group, &[]);
                pass.dispatch_workgroups(workgroups, 1, 1);
            }
            encoder.copy_buffer_to_buffer(&buffers.result, 0, &buffers.staging, 0, RESULT_BYTES);
            self.ctx.queue.submit(Some(encoder.finish()));

            let (cell_completed, cell_composite) = self.read_result(&buffers.staging)?;
            completed = cell_completed;
            composite = cell_composite;

            let _ = progress_tx.send(ProgressSnapshot {
                completed,
                total,
                composite,
                done: false,
            });

            next += slice_len;
        }

        Ok((completed, composite))
    }

    /// Map the staging copy of the result cell, bounded by the dispatch
    /// deadline.
    fn read_result(&self, staging: &wgpu::Buffer) -> Result<(u32, bool)> {
        let limit = self.config.dispatch_timeout;
        let slice = staging.slice(0..RESULT_BYTES);

        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let waited = Instant::now();
        // the only poll error wgpu reports is a wait timeout
        self.ctx
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(limit),
            })
            .map_err(|_| TesterError::DeviceTimeout {
                waited_ms: waited.elapsed().as_millis() as u64,
                limit_ms: limit.as_millis() as u64,
            })?;

        rx.recv()
            .map_err(|_| TesterError::DeviceUnavailable("buffer map callback dropped".into()))?
            .map_err(|e| TesterError::DeviceUnavailable(format!("result readback failed: {e}")))?;

        let data = slice.get_mapped_range();
        let words: &[u32] = bytemuck::cast_slice(&data);
        let cell = (words[1], words[0] != 0);
        drop(data);
        staging.unmap();

        Ok(cell)
    }
}

impl RoundRunner for DeviceRoundRunner {
    fn run(&mut self, params: &WitnessParameters) -> Result<RunOutcome> {
        let started = Instant::now();
        let buffers = self.create_buffers(params);

        let (progress_tx, progress_rx) = mpsc::channel();
        let reporter = self.progress.clone().map(|sink| {
            let interval = self.config.poll_interval;
            thread::spawn(move || reporter_loop(progress_rx, sink, interval))
        });

        let outcome = self.execute_slices(params, &buffers, &progress_tx);

        // On success the reporter renders the final state before exiting;
        // on failure it simply observes the channel closing.
        if let Ok((completed, composite)) = &outcome {
            let _ = progress_tx.send(ProgressSnapshot {
                completed: *completed,
                total: params.rounds,
                composite: *composite,
                done: true,
            });
        }
        drop(progress_tx);
        if let Some(handle) = reporter {
            let _ = handle.join();
        }

        let (completed, composite) = outcome?;
        let verdict = if composite {
            Verdict::Composite
        } else {
            Verdict::ProbablyPrime
        };
        debug!(%verdict, rounds_completed = completed, "witness run finished");

        Ok(RunOutcome {
            verdict,
            rounds_completed: completed,
            elapsed: started.elapsed(),
        })
    }
}

/// Reporter thread body: forward snapshots to the sink, re-render on the
/// cadence while waiting, stop at the first terminal snapshot.
fn reporter_loop(
    rx: mpsc::Receiver<ProgressSnapshot>,
    sink: ProgressFn,
    interval: Duration,
) {
    let mut last: Option<ProgressSnapshot> = None;
    loop {
        match rx.recv_timeout(interval) {
            Ok(snapshot) => {
                sink(snapshot);
                if snapshot.is_terminal() {
                    break;
                }
                last = Some(snapshot);
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(snapshot) = last {
                    sink(snapshot);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
