//! Compute device discovery and context management.
//!
//! Adapter selection prefers hardware devices over software renderers:
//! one pass that skips anything that looks like a CPU rasterizer, then a
//! second pass that accepts whatever is left. Discrete GPUs rank above
//! integrated, Vulkan above the other backends.

use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::error::{Result, TesterError};

/// Backend selection, exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum GpuBackend {
    /// Try backends in fallback order (Vulkan, Metal, DX12, GL)
    #[default]
    Auto,
    /// Vulkan (Linux, Windows, Android)
    Vulkan,
    /// DirectX 12 (Windows)
    Dx12,
    /// Metal (macOS, iOS)
    Metal,
    /// OpenGL fallback
    Gl,
}

impl GpuBackend {
    pub fn to_wgpu_backends(self) -> wgpu::Backends {
        match self {
            GpuBackend::Auto => wgpu::Backends::all(),
            GpuBackend::Vulkan => wgpu::Backends::VULKAN,
            GpuBackend::Dx12 => wgpu::Backends::DX12,
            GpuBackend::Metal => wgpu::Backends::METAL,
            GpuBackend::Gl => wgpu::Backends::GL,
        }
    }

    fn fallback_order() -> &'static [GpuBackend] {
        &[
            GpuBackend::Vulkan,
            GpuBackend::Metal,
            GpuBackend::Dx12,
            GpuBackend::Gl,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            GpuBackend::Auto => "auto",
            GpuBackend::Vulkan => "Vulkan",
            GpuBackend::Dx12 => "DX12",
            GpuBackend::Metal => "Metal",
            GpuBackend::Gl => "OpenGL",
        }
    }
}

impl std::fmt::Display for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One adapter as reported by the `info` subcommand.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterSummary {
    pub index: usize,
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
    pub max_workgroup_size: u32,
    pub max_workgroups_per_dimension: u32,
}

#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Open the device at `device_index` on the requested backend.
    pub async fn new(device_index: u32, backend: GpuBackend) -> Result<Self> {
        match backend {
            GpuBackend::Auto => Self::new_with_fallback(device_index).await,
            _ => Self::try_backend(device_index, backend, false).await,
        }
    }

    async fn new_with_fallback(device_index: u32) -> Result<Self> {
        // Hardware adapters first, software renderers only as a last resort
        for &backend in GpuBackend::fallback_order() {
            debug!(%backend, "probing backend (hardware only)");
            match Self::try_backend(device_index, backend, true).await {
                Ok(ctx) => {
                    info!(%backend, device = ctx.device_name(), "compute device ready");
                    return Ok(ctx);
                }
                Err(e) => debug!(%backend, error = %e, "hardware probe failed"),
            }
        }

        debug!("no hardware adapter found, accepting software renderers");
        for &backend in GpuBackend::fallback_order() {
            match Self::try_backend(device_index, backend, false).await {
                Ok(ctx) => {
                    info!(
                        %backend,
                        device = ctx.device_name(),
                        "compute device ready (software renderer)"
                    );
                    return Ok(ctx);
                }
                Err(e) => debug!(%backend, error = %e, "probe failed"),
            }
        }

        Err(TesterError::DeviceUnavailable(
            "no compute-capable adapter on any backend".into(),
        ))
    }

    fn is_software_adapter(device_type: wgpu::DeviceType, name: &str) -> bool {
        if device_type == wgpu::DeviceType::Cpu {
            return true;
        }
        let name = name.to_lowercase();
        name.contains("llvmpipe")
            || name.contains("swiftshader")
            || name.contains("software")
            || name.contains("lavapipe")
    }

    async fn try_backend(
        device_index: u32,
        backend: GpuBackend,
        hardware_only: bool,
    ) -> Result<Self> {
        let adapters = Self::ranked_adapters(backend, hardware_only).await;
        if adapters.is_empty() {
            return Err(TesterError::DeviceUnavailable(format!(
                "no {}{} adapters found",
                if hardware_only { "hardware " } else { "" },
                backend
            )));
        }

        let count = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(device_index as usize)
            .ok_or_else(|| {
                TesterError::DeviceUnavailable(format!(
                    "device index {device_index} out of range ({count} {backend} adapters)"
                ))
            })?;

        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("primeray"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                TesterError::DeviceSetup(format!("device request on {backend} failed: {e}"))
            })?;

        let limits = device.limits();

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            limits,
        })
    }

    /// Adapters for a backend, best first: discrete over integrated over
    /// CPU, Vulkan over the rest.
    async fn ranked_adapters(backend: GpuBackend, hardware_only: bool) -> Vec<wgpu::Adapter> {
        let backends = backend.to_wgpu_backends();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let mut adapters: Vec<_> = instance.enumerate_adapters(backends).await;
        if hardware_only {
            adapters.retain(|a| {
                let info = a.get_info();
                !Self::is_software_adapter(info.device_type, &info.name)
            });
        }

        adapters.sort_by_key(|a| {
            let info = a.get_info();
            let device_priority = match info.device_type {
                wgpu::DeviceType::DiscreteGpu => 0,
                wgpu::DeviceType::VirtualGpu => 1,
                wgpu::DeviceType::IntegratedGpu => 2,
                wgpu::DeviceType::Cpu => 3,
                _ => 4,
            };
            let backend_priority = match info.backend {
                wgpu::Backend::Vulkan => 0,
                wgpu::Backend::Metal => 1,
                wgpu::Backend::Dx12 => 2,
                wgpu::Backend::Gl => 3,
                _ => 4,
            };
            (device_priority, backend_priority)
        });

        adapters
    }

    /// Enumerate every visible adapter without opening a device.
    pub async fn describe_adapters(backend: GpuBackend) -> Result<Vec<AdapterSummary>> {
        let adapters = Self::ranked_adapters(backend, false).await;
        if adapters.is_empty() {
            return Err(TesterError::DeviceUnavailable(format!(
                "no {backend} adapters found"
            )));
        }

        Ok(adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| {
                let info = adapter.get_info();
                let limits = adapter.limits();
                AdapterSummary {
                    index,
                    name: info.name.clone(),
                    backend: format!("{:?}", info.backend),
                    device_type: format!("{:?}", info.device_type),
                    driver: info.driver.clone(),
                    max_workgroup_size: limits.max_compute_workgroup_size_x,
                    max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
                }
            })
            .collect())
    }

    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    pub fn max_workgroup_size(&self) -> u32 {
        self.limits.max_compute_workgroup_size_x
    }

    pub fn max_workgroups(&self) -> u32 {
        self.limits.max_compute_workgroups_per_dimension
    }

    /// Uninitialized buffer sized for `count` elements of `T`.
    pub fn create_buffer<T: bytemuck::Pod>(
        &self,
        label: &str,
        usage: wgpu::BufferUsages,
        count: u64,
    ) -> wgpu::Buffer {
        let size = count * std::mem::size_of::<T>() as u64;
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Buffer initialized from a slice.
    pub fn create_buffer_init<T: bytemuck::Pod>(
        &self,
        label: &str,
        usage: wgpu::BufferUsages,
        data: &[T],
    ) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage,
            })
    }

    pub fn create_shader_module(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }
}
