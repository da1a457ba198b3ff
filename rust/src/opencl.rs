//! OpenCL backend over `opencl3`. Each wrapper type releases its handle on drop.

use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU};
use opencl3::error_codes::ClError;
use opencl3::kernel::Kernel;
use opencl3::memory::{Buffer, ClMem, CL_MEM_WRITE_ONLY};
use opencl3::platform::{get_platforms, Platform};
use opencl3::program::Program;
use opencl3::types::{cl_float, cl_int, CL_BLOCKING};

use crate::runtime::{ComputeRuntime, DeviceKind};
use crate::source::OPENCL_INLINE;

/// What an ICD loader with no installed platforms returns from clGetPlatformIDs.
const CL_PLATFORM_NOT_FOUND_KHR: cl_int = -1001;

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCl;

fn installed<T>(platforms: Result<Vec<T>, ClError>) -> Result<Vec<T>, ClError> {
    match platforms {
        Err(ClError(CL_PLATFORM_NOT_FOUND_KHR)) => Ok(Vec::new()),
        other => other,
    }
}

impl ComputeRuntime for OpenCl {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Program = Program;
    type Kernel = Kernel;
    type Buffer = Buffer<cl_float>;
    type Queue = CommandQueue;
    type Error = ClError;

    const INLINE_SOURCE: &'static str = OPENCL_INLINE;
    const DEFAULT_SOURCE_FILE: &'static str = "simple.cl";

    fn platforms(&self) -> Result<Vec<Platform>, ClError> { installed(get_platforms()) }

    fn devices(&self, platform: &Platform, kind: DeviceKind) -> Result<Vec<Device>, ClError> {
        let device_type = match kind {
            DeviceKind::Gpu => CL_DEVICE_TYPE_GPU,
            DeviceKind::Cpu => CL_DEVICE_TYPE_CPU,
        };
        Ok(platform.get_devices(device_type)?.into_iter().map(Device::new).collect())
    }

    fn create_context(&self, device: &Device) -> Result<Context, ClError> { Context::from_device(device) }

    fn create_program(&self, context: &Context, source: &str) -> Result<Program, ClError> {
        Program::create_from_source(context, source)
    }

    fn build_program(&self, program: &mut Program, device: &Device) -> Result<(), ClError> {
        program.build(&[device.id()], "")
    }

    // clGetProgramBuildInfo is called once for the size and once for the bytes.
    fn build_log(&self, program: &Program, device: &Device) -> Result<String, ClError> {
        program.get_build_log(device.id())
    }

    fn create_kernel(&self, program: &Program, name: &'static str) -> Result<Kernel, ClError> {
        Kernel::create(program, name)
    }

    fn create_buffer(&self, context: &Context, len: usize) -> Result<Buffer<cl_float>, ClError> {
        unsafe { Buffer::<cl_float>::create(context, CL_MEM_WRITE_ONLY, len, ptr::null_mut()) }
    }

    fn set_output_arg(&self, kernel: &mut Kernel, buffer: &Buffer<cl_float>) -> Result<(), ClError> {
        unsafe { kernel.set_arg(0, &buffer.get()) }
    }

    #[allow(deprecated)]
    fn create_queue(&self, context: &Context, device: &Device) -> Result<CommandQueue, ClError> {
        unsafe { CommandQueue::create(context, device.id(), 0) }
    }

    fn enqueue_kernel(&self, queue: &CommandQueue, kernel: &Kernel, global_work_size: usize) -> Result<(), ClError> {
        let global = [global_work_size];
        // The event is released on drop; completion is observed by the blocking read.
        let _event = unsafe {
            queue.enqueue_nd_range_kernel(kernel.get(), 1, ptr::null(), global.as_ptr(), ptr::null(), &[])?
        };
        Ok(())
    }

    fn read_buffer(&self, queue: &CommandQueue, buffer: &Buffer<cl_float>, out: &mut [f32]) -> Result<(), ClError> {
        let _event = unsafe { queue.enqueue_read_buffer(buffer, CL_BLOCKING, 0, out, &[])? };
        Ok(())
    }
}
