use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed backend error, tagged with the [`Step`] that produced it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Couldn't find any platforms")]
    NoPlatform,

    #[error("Couldn't find any GPU devices")]
    NoGpu,

    #[error("Couldn't find any CPU devices either")]
    NoDevice,

    #[error("Couldn't read the kernel source {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program failed to build. `log` is the complete build log.
    #[error("Couldn't build the program")]
    Build { log: String },

    #[error("{step}: {source}")]
    Api {
        step: Step,
        #[source]
        source: BoxError,
    },

    #[error("{backend} support not compiled in, rebuild with: cargo run --features {feature}")]
    BackendUnavailable {
        backend: &'static str,
        feature: &'static str,
    },
}

impl Error {
    pub fn api<E>(step: Step, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Api { step, source: Box::new(source) }
    }

    /// The step that failed, if the failure came from the compute API.
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Api { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Calls into the compute API that can fail on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Platforms,
    Context,
    Program,
    Kernel,
    Buffer,
    KernelArg,
    Queue,
    Enqueue,
    Read,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Platforms => "Couldn't query the platforms",
            Step::Context => "Couldn't create a context",
            Step::Program => "Couldn't create the program",
            Step::Kernel => "Couldn't create the kernel",
            Step::Buffer => "Couldn't create the buffer",
            Step::KernelArg => "Couldn't set the kernel argument",
            Step::Queue => "Couldn't create the command queue",
            Step::Enqueue => "Couldn't enqueue the kernel execution command",
            Step::Read => "Couldn't enqueue the read buffer command",
        })
    }
}
