//! CUDA backend over `cudarc`. NVRTC compiles the program; its compile log is the build log.
//! The driver is the only platform and it exposes no CPU devices.

use std::panic::{self, UnwindSafe};
use std::sync::Arc;

use cudarc::driver::sys::CUdeviceptr;
use cudarc::driver::{CudaDevice, CudaFunction, CudaSlice, DevicePtr, DriverError, LaunchAsync, LaunchConfig};
use cudarc::nvrtc::{compile_ptx, CompileError, Ptx};

use crate::runtime::{ComputeRuntime, DeviceKind};
use crate::source::CUDA_INLINE;

const MODULE: &str = "simplecl";

#[derive(Debug, thiserror::Error)]
pub enum CudaError {
    #[error("driver: {0:?}")]
    Driver(#[from] DriverError),
    #[error("nvrtc: {0:?}")]
    Compile(CompileError),
    #[error("program has not been built")]
    NotBuilt,
    #[error("function {0} not found in module")]
    MissingFunction(&'static str),
    #[error("kernel argument 0 is not bound")]
    Unbound,
    #[error("driver library unavailable: {0}")]
    Unavailable(String),
}

// cudarc loads libcuda lazily and panics when it is missing.
fn driver_call<T, F>(call: F) -> Result<T, CudaError>
where
    F: FnOnce() -> Result<T, DriverError> + UnwindSafe,
{
    match panic::catch_unwind(call) {
        Ok(result) => Ok(result?),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied())
                .unwrap_or("driver initialisation panicked");
            Err(CudaError::Unavailable(msg.to_owned()))
        }
    }
}

fn compile_log(err: &CompileError) -> String {
    match err {
        CompileError::CompileError { log, .. } => log.to_string_lossy().into_owned(),
        other => format!("{other:?}"),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Cuda;

/// The CUDA driver, present when it reports at least one device.
#[derive(Debug, Clone, Copy)]
pub struct Driver { devices: usize }

pub struct CudaProgram {
    device: Arc<CudaDevice>,
    source: String,
    ptx: Option<Ptx>,
    log: String,
}

pub struct CudaKernel {
    func: CudaFunction,
    output: Option<CUdeviceptr>,
}

impl ComputeRuntime for Cuda {
    type Platform = Driver;
    type Device = usize;
    type Context = Arc<CudaDevice>;
    type Program = CudaProgram;
    type Kernel = CudaKernel;
    type Buffer = CudaSlice<f32>;
    // Work is submitted on the device's default stream.
    type Queue = Arc<CudaDevice>;
    type Error = CudaError;

    const INLINE_SOURCE: &'static str = CUDA_INLINE;
    const DEFAULT_SOURCE_FILE: &'static str = "simple.cu";

    fn platforms(&self) -> Result<Vec<Driver>, CudaError> {
        let devices = driver_call(CudaDevice::count)? as usize;
        Ok(if devices > 0 { vec![Driver { devices }] } else { Vec::new() })
    }

    fn devices(&self, platform: &Driver, kind: DeviceKind) -> Result<Vec<usize>, CudaError> {
        Ok(match kind {
            DeviceKind::Gpu => (0..platform.devices).collect(),
            DeviceKind::Cpu => Vec::new(),
        })
    }

    fn create_context(&self, device: &usize) -> Result<Arc<CudaDevice>, CudaError> { Ok(CudaDevice::new(*device)?) }

    fn create_program(&self, context: &Arc<CudaDevice>, source: &str) -> Result<CudaProgram, CudaError> {
        Ok(CudaProgram { device: Arc::clone(context), source: source.to_owned(), ptx: None, log: String::new() })
    }

    fn build_program(&self, program: &mut CudaProgram, _device: &usize) -> Result<(), CudaError> {
        match compile_ptx(&program.source) {
            Ok(ptx) => {
                program.ptx = Some(ptx);
                Ok(())
            }
            Err(err) => {
                program.log = compile_log(&err);
                Err(CudaError::Compile(err))
            }
        }
    }

    fn build_log(&self, program: &CudaProgram, _device: &usize) -> Result<String, CudaError> { Ok(program.log.clone()) }

    fn create_kernel(&self, program: &CudaProgram, name: &'static str) -> Result<CudaKernel, CudaError> {
        let ptx = program.ptx.clone().ok_or(CudaError::NotBuilt)?;
        program.device.load_ptx(ptx, MODULE, &[name])?;
        let func = program.device.get_func(MODULE, name).ok_or(CudaError::MissingFunction(name))?;
        Ok(CudaKernel { func, output: None })
    }

    fn create_buffer(&self, context: &Arc<CudaDevice>, len: usize) -> Result<CudaSlice<f32>, CudaError> {
        Ok(context.alloc_zeros::<f32>(len)?)
    }

    fn set_output_arg(&self, kernel: &mut CudaKernel, buffer: &CudaSlice<f32>) -> Result<(), CudaError> {
        kernel.output = Some(*buffer.device_ptr());
        Ok(())
    }

    fn create_queue(&self, context: &Arc<CudaDevice>, _device: &usize) -> Result<Arc<CudaDevice>, CudaError> {
        Ok(Arc::clone(context))
    }

    fn enqueue_kernel(&self, _queue: &Arc<CudaDevice>, kernel: &CudaKernel, global_work_size: usize) -> Result<(), CudaError> {
        let output = kernel.output.ok_or(CudaError::Unbound)?;
        let cfg = LaunchConfig { grid_dim: (1, 1, 1), block_dim: (global_work_size as u32, 1, 1), shared_mem_bytes: 0 };
        unsafe { kernel.func.clone().launch(cfg, (output,)) }?;
        Ok(())
    }

    fn read_buffer(&self, queue: &Arc<CudaDevice>, buffer: &CudaSlice<f32>, out: &mut [f32]) -> Result<(), CudaError> {
        Ok(queue.dtoh_sync_copy_into(buffer, out)?)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use cudarc::nvrtc::result::NvrtcError;
    use cudarc::nvrtc::sys::nvrtcResult;

    use super::*;

    #[test]
    fn missing_driver_library_is_an_error() {
        let err = driver_call(|| -> Result<i32, DriverError> { panic!("libcuda.so: cannot open shared object file") })
            .unwrap_err();
        match err {
            CudaError::Unavailable(msg) => assert!(msg.contains("libcuda.so")),
            other => panic!("expected an unavailable driver, got {other:?}"),
        }
    }

    #[test]
    fn driver_results_pass_through() {
        assert_eq!(driver_call(|| Ok::<_, DriverError>(2)).unwrap(), 2);
    }

    #[test]
    fn compile_log_is_the_nvrtc_log() {
        let err = CompileError::CompileError {
            nvrtc: NvrtcError(nvrtcResult::NVRTC_ERROR_COMPILATION),
            options: Vec::new(),
            log: CString::new("kernel.cu(2): error: expected a \";\"").unwrap(),
        };
        assert_eq!(compile_log(&err), "kernel.cu(2): error: expected a \";\"");
    }

    #[test]
    fn other_nvrtc_failures_still_leave_a_log() {
        let err = CompileError::CreationError(NvrtcError(nvrtcResult::NVRTC_ERROR_OUT_OF_MEMORY));
        let log = compile_log(&err);
        assert!(log.contains("CreationError"), "{log}");
    }
}
