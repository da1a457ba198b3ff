//! Run one constant-store kernel through a compute API and report what it wrote.

pub mod error;
pub mod outcome;
pub mod runtime;
pub mod source;
pub mod walkthrough;

#[cfg(feature = "opencl")] pub mod opencl;
#[cfg(feature = "cuda")] pub mod cuda;

pub use error::{Error, Result, Step};
pub use outcome::{Outcome, Report};
pub use runtime::{ComputeRuntime, DeviceKind, DevicePolicy};
pub use source::{KernelSource, KERNEL_NAME, WORK_ITEMS};
pub use walkthrough::run;
