use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use simplecl::{ComputeRuntime, DevicePolicy, Error, KernelSource, Report};

#[derive(Parser, Debug)]
#[command(name = "simplecl")]
#[command(author, version, about = "Run a one-line kernel and check that it wrote 1.0", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Compute API to run the kernel on
    #[arg(long, value_enum, default_value_t = Backend::Opencl, global = true)]
    backend: Backend,

    /// Fail instead of falling back to a CPU device when no GPU is found
    #[arg(long, global = true)]
    gpu_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Build the kernel from the built-in source string
    Inline,
    /// Build the kernel from a source file
    File {
        /// Kernel source file [default: simple.cl for OpenCL, simple.cu for CUDA]
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Backend { Opencl, Cuda }

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let policy = if cli.gpu_only { DevicePolicy::GpuOnly } else { DevicePolicy::GpuThenCpu };
    let result = match cli.backend {
        Backend::Opencl => opencl(&cli.command, policy),
        Backend::Cuda => cuda(&cli.command, policy),
    };

    ExitCode::from(finish(result, &mut io::stdout().lock(), &mut io::stderr().lock()))
}

/// Reports a run and picks the exit status: 0 once the result was classified,
/// whatever it was, 1 on any failure. A build failure prints its log to `out` first.
fn finish(result: simplecl::Result<Report>, out: &mut impl Write, err: &mut impl Write) -> u8 {
    // Nothing sensible is left to do if the streams themselves are gone.
    match result {
        Ok(report) => {
            let _ = writeln!(out, "{}", report.outcome);
            0
        }
        Err(e) => {
            if let Error::Build { log } = &e {
                let _ = writeln!(out, "{log}");
            }
            let _ = writeln!(err, "{e}");
            1
        }
    }
}

fn execute<R: ComputeRuntime>(rt: R, command: &Command, policy: DevicePolicy) -> simplecl::Result<Report> {
    let source = match command {
        Command::Inline => KernelSource::Inline,
        Command::File { path } => KernelSource::file(path.as_deref().unwrap_or(Path::new(R::DEFAULT_SOURCE_FILE))),
    };
    simplecl::run(&rt, &source, policy)
}

#[cfg(feature = "opencl")]
fn opencl(command: &Command, policy: DevicePolicy) -> simplecl::Result<Report> {
    execute(simplecl::opencl::OpenCl, command, policy)
}

#[cfg(not(feature = "opencl"))]
fn opencl(_command: &Command, _policy: DevicePolicy) -> simplecl::Result<Report> {
    Err(Error::BackendUnavailable { backend: "OpenCL", feature: "opencl" })
}

#[cfg(feature = "cuda")]
fn cuda(command: &Command, policy: DevicePolicy) -> simplecl::Result<Report> {
    execute(simplecl::cuda::Cuda, command, policy)
}

#[cfg(not(feature = "cuda"))]
fn cuda(_command: &Command, _policy: DevicePolicy) -> simplecl::Result<Report> {
    Err(Error::BackendUnavailable { backend: "CUDA", feature: "cuda" })
}

#[cfg(test)]
mod tests {
    use simplecl::{DeviceKind, Outcome, WORK_ITEMS};

    use super::*;

    fn report(value: f32) -> simplecl::Result<Report> {
        let mut results = [0.0; WORK_ITEMS];
        results[0] = value;
        Ok(Report { device: DeviceKind::Gpu, results, outcome: Outcome::classify(value) })
    }

    fn streams(result: simplecl::Result<Report>) -> (u8, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let status = finish(result, &mut out, &mut err);
        (status, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn success_prints_the_outcome_and_exits_zero() {
        let (status, out, err) = streams(report(1.0));
        assert_eq!(status, 0);
        assert_eq!(out, "kernel successfully set result to 1.0\n");
        assert!(err.is_empty());
    }

    #[test]
    fn erroneous_value_is_reported_not_failed() {
        let (status, out, err) = streams(report(2.5));
        assert_eq!(status, 0);
        assert_eq!(out, "kernel set result to erroneous value: 2.5\n");
        assert!(err.is_empty());
    }

    #[test]
    fn did_not_run_still_exits_zero() {
        let (status, out, _) = streams(report(0.0));
        assert_eq!(status, 0);
        assert!(out.contains("likely didn't run"));
    }

    #[test]
    fn build_failure_prints_the_whole_log_then_fails() {
        let log: String = (0..2048).map(|i| format!("<kernel>:{i}:5: error: use of undeclared identifier 'x'\n")).collect();
        let (status, out, err) = streams(Err(Error::Build { log: log.clone() }));
        assert_eq!(status, 1);
        assert_eq!(out, format!("{log}\n"));
        assert_eq!(err, "Couldn't build the program\n");
    }

    #[test]
    fn setup_failure_goes_to_stderr_only() {
        let (status, out, err) = streams(Err(Error::NoPlatform));
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert_eq!(err, "Couldn't find any platforms\n");
    }

    #[test]
    fn defaults_to_opencl_with_cpu_fallback() {
        let cli = Cli::try_parse_from(["simplecl", "inline"]).unwrap();
        assert_eq!(cli.backend, Backend::Opencl);
        assert!(!cli.gpu_only);
        assert_eq!(cli.command, Command::Inline);
    }

    #[test]
    fn file_takes_an_optional_path() {
        let cli = Cli::try_parse_from(["simplecl", "file"]).unwrap();
        assert_eq!(cli.command, Command::File { path: None });

        let cli = Cli::try_parse_from(["simplecl", "--backend", "cuda", "-vv", "file", "--path", "k.cu", "--gpu-only"]).unwrap();
        assert_eq!(cli.backend, Backend::Cuda);
        assert_eq!(cli.verbose, 2);
        assert!(cli.gpu_only);
        assert_eq!(cli.command, Command::File { path: Some(PathBuf::from("k.cu")) });
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["simplecl"]).is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn missing_backend_names_the_feature() {
        let err = cuda(&Command::Inline, DevicePolicy::default()).unwrap_err();
        assert!(err.to_string().contains("--features cuda"));
    }
}
