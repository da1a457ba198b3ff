//! runtime
//! One method per compute-API call the walkthrough makes. Handles are owned
//! values that release their native resource on drop.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind { Gpu, Cpu }

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { DeviceKind::Gpu => "GPU", DeviceKind::Cpu => "CPU" })
    }
}

/// What to do when the platform has no GPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePolicy {
    #[default]
    GpuThenCpu,
    GpuOnly,
}

pub trait ComputeRuntime {
    type Platform;
    type Device;
    type Context;
    type Program;
    type Kernel;
    type Buffer;
    type Queue;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Kernel source used by `KernelSource::Inline`.
    const INLINE_SOURCE: &'static str;
    /// Sidecar file read by `KernelSource::File` when no path is given.
    const DEFAULT_SOURCE_FILE: &'static str;

    fn platforms(&self) -> Result<Vec<Self::Platform>, Self::Error>;
    fn devices(&self, platform: &Self::Platform, kind: DeviceKind) -> Result<Vec<Self::Device>, Self::Error>;
    fn create_context(&self, device: &Self::Device) -> Result<Self::Context, Self::Error>;
    fn create_program(&self, context: &Self::Context, source: &str) -> Result<Self::Program, Self::Error>;
    fn build_program(&self, program: &mut Self::Program, device: &Self::Device) -> Result<(), Self::Error>;
    /// Full build log of `program` for `device`. Sized by querying the log length first.
    fn build_log(&self, program: &Self::Program, device: &Self::Device) -> Result<String, Self::Error>;
    fn create_kernel(&self, program: &Self::Program, name: &'static str) -> Result<Self::Kernel, Self::Error>;
    /// Write-only device buffer of `len` floats.
    fn create_buffer(&self, context: &Self::Context, len: usize) -> Result<Self::Buffer, Self::Error>;
    /// Bind `buffer` as argument 0 of `kernel`.
    fn set_output_arg(&self, kernel: &mut Self::Kernel, buffer: &Self::Buffer) -> Result<(), Self::Error>;
    fn create_queue(&self, context: &Self::Context, device: &Self::Device) -> Result<Self::Queue, Self::Error>;
    /// One-dimensional dispatch, local size left to the runtime.
    fn enqueue_kernel(&self, queue: &Self::Queue, kernel: &Self::Kernel, global_work_size: usize) -> Result<(), Self::Error>;
    /// Blocking read of `out.len()` floats from the start of `buffer`.
    fn read_buffer(&self, queue: &Self::Queue, buffer: &Self::Buffer, out: &mut [f32]) -> Result<(), Self::Error>;
}
