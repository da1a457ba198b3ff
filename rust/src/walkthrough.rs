//! The kernel execution walkthrough: setup, dispatch, readback, classify, teardown.

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result, Step};
use crate::outcome::{Outcome, Report, UNTOUCHED};
use crate::runtime::{ComputeRuntime, DeviceKind, DevicePolicy};
use crate::source::{KernelSource, KERNEL_NAME, WORK_ITEMS};

/// Runs the `simple` kernel once on `rt` and classifies what it wrote.
///
/// Every handle is an owned value, so an early return releases whatever was
/// acquired so far. The success path releases buffer, kernel, queue, program
/// and context in that order.
pub fn run<R: ComputeRuntime>(rt: &R, source: &KernelSource, policy: DevicePolicy) -> Result<Report> {
    let platform = rt
        .platforms()
        .map_err(|e| Error::api(Step::Platforms, e))?
        .into_iter()
        .next()
        .ok_or(Error::NoPlatform)?;
    debug!("platform found");

    let (kind, device) = select_device(rt, &platform, policy)?;
    info!(device = %kind, "device selected");

    let context = rt.create_context(&device).map_err(|e| Error::api(Step::Context, e))?;
    debug!("context created");

    let text = source.load(R::INLINE_SOURCE)?;
    debug!(bytes = text.len(), ?source, "kernel source loaded");

    let mut program = rt.create_program(&context, &text).map_err(|e| Error::api(Step::Program, e))?;
    if let Err(err) = rt.build_program(&mut program, &device) {
        warn!(%err, "program build failed");
        let log = rt.build_log(&program, &device).unwrap_or_else(|err| {
            warn!(%err, "build log unavailable");
            String::new()
        });
        return Err(Error::Build { log });
    }
    debug!("program built");

    let mut kernel = rt.create_kernel(&program, KERNEL_NAME).map_err(|e| Error::api(Step::Kernel, e))?;
    let buffer = rt.create_buffer(&context, WORK_ITEMS).map_err(|e| Error::api(Step::Buffer, e))?;
    rt.set_output_arg(&mut kernel, &buffer).map_err(|e| Error::api(Step::KernelArg, e))?;
    let queue = rt.create_queue(&context, &device).map_err(|e| Error::api(Step::Queue, e))?;

    rt.enqueue_kernel(&queue, &kernel, WORK_ITEMS).map_err(|e| Error::api(Step::Enqueue, e))?;
    debug!(work_items = WORK_ITEMS, "kernel enqueued");

    let mut results = [UNTOUCHED; WORK_ITEMS];
    rt.read_buffer(&queue, &buffer, &mut results).map_err(|e| Error::api(Step::Read, e))?;
    debug!(?results, "buffer read back");

    let outcome = Outcome::classify(results[0]);
    info!(%outcome, "kernel finished");

    trace!("releasing buffer, kernel, queue, program, context");
    drop(buffer);
    drop(kernel);
    drop(queue);
    drop(program);
    drop(context);

    Ok(Report { device: kind, results, outcome })
}

fn select_device<R: ComputeRuntime>(
    rt: &R,
    platform: &R::Platform,
    policy: DevicePolicy,
) -> Result<(DeviceKind, R::Device)> {
    if let Some(gpu) = first_device(rt, platform, DeviceKind::Gpu) {
        return Ok((DeviceKind::Gpu, gpu));
    }
    match policy {
        DevicePolicy::GpuOnly => Err(Error::NoGpu),
        DevicePolicy::GpuThenCpu => {
            warn!("Couldn't find any GPU devices, using CPU");
            first_device(rt, platform, DeviceKind::Cpu)
                .map(|cpu| (DeviceKind::Cpu, cpu))
                .ok_or(Error::NoDevice)
        }
    }
}

// A failed query counts as "none of this kind".
fn first_device<R: ComputeRuntime>(rt: &R, platform: &R::Platform, kind: DeviceKind) -> Option<R::Device> {
    match rt.devices(platform, kind) {
        Ok(devices) => devices.into_iter().next(),
        Err(err) => {
            debug!(%kind, %err, "device query failed");
            None
        }
    }
}
