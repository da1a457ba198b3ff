//! Kernel sources
//! The kernel writes 1.0 into `result[0]`; every work-item does the same store.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Entry point every kernel source must define.
pub const KERNEL_NAME: &str = "simple";

/// Dispatch size. Also the length of the device buffer and of the readback.
pub const WORK_ITEMS: usize = 4;

pub const OPENCL_INLINE: &str =
    "__kernel void simple(__global float* result) {\n    result[0] = 1.0;\n}\n";

pub const CUDA_INLINE: &str =
    "extern \"C\" __global__ void simple(float* result) {\n    result[0] = 1.0f;\n}\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    /// The backend's built-in literal.
    Inline,
    /// A sidecar file read whole into memory.
    File(PathBuf),
}

impl KernelSource {
    pub fn file(path: impl AsRef<Path>) -> Self { KernelSource::File(path.as_ref().to_path_buf()) }

    /// Text to hand to the program build; `inline` is used for [`KernelSource::Inline`].
    pub fn load(&self, inline: &str) -> Result<String> {
        match self {
            KernelSource::Inline => Ok(inline.to_owned()),
            KernelSource::File(path) => fs::read_to_string(path)
                .map_err(|source| Error::Source { path: path.clone(), source }),
        }
    }
}
