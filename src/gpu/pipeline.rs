//! Compute pipeline for the witness kernel.

use std::sync::Arc;

use tracing::debug;
use wgpu::{BindGroupLayout, ComputePipeline};

use super::GpuContext;
use crate::error::{Result, TesterError};
use crate::params::{DispatchParams, OperandBlock};

/// Lanes per workgroup; overrides the kernel's pipeline constant.
pub const WORKGROUP_SIZE: u32 = 64;

/// Kernel source, embedded at build time and printable via the `kernel`
/// subcommand.
pub const KERNEL_SOURCE: &str = include_str!("shaders/miller_rabin.wgsl");

/// Witness compute pipeline (Clone is cheap, wgpu types are Arc-wrapped).
#[derive(Clone)]
pub struct WitnessPipeline {
    pub pipeline: Arc<ComputePipeline>,
    pub bind_group_layout: Arc<BindGroupLayout>,
}

impl WitnessPipeline {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        if ctx.max_workgroup_size() < WORKGROUP_SIZE {
            return Err(TesterError::KernelBuild(format!(
                "device workgroup limit {} is below the kernel's {}",
                ctx.max_workgroup_size(),
                WORKGROUP_SIZE
            )));
        }

        debug!("compiling witness kernel");
        let shader = ctx.create_shader_module("witness-kernel", KERNEL_SOURCE);

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("witness-bind-group-layout"),
                    entries: &[
                        // Dispatch scalars (uniform, rewritten per slice)
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(
                                    std::mem::size_of::<DispatchParams>() as u64,
                                ),
                            },
                            count: None,
                        },
                        // Big-integer operands (read-only)
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Storage { read_only: true },
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(
                                    std::mem::size_of::<OperandBlock>() as u64,
                                ),
                            },
                            count: None,
                        },
                        // Witness pool (read-only, runtime-sized)
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Storage { read_only: true },
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        // Result cell (read-write atomics)
                        wgpu::BindGroupLayoutEntry {
                            binding: 3,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Storage { read_only: false },
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(8),
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("witness-pipeline-layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let constants = [("WORKGROUP_SIZE", WORKGROUP_SIZE as f64)];
        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("witness-pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
                cache: None,
            });
        debug!("witness pipeline ready");

        Ok(Self {
            pipeline: Arc::new(pipeline),
            bind_group_layout: Arc::new(bind_group_layout),
        })
    }
}
