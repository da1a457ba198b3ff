//! Classification of the value the kernel left in the first output slot.

use std::fmt;

use crate::runtime::DeviceKind;
use crate::source::WORK_ITEMS;

/// Value the kernel is expected to write.
pub const EXPECTED: f32 = 1.0;
/// Value of an output slot nothing wrote to.
pub const UNTOUCHED: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Success,
    /// The slot still holds [`UNTOUCHED`]; the kernel most likely never ran.
    DidNotRun,
    Erroneous(f32),
}

impl Outcome {
    pub fn classify(value: f32) -> Self {
        if value == EXPECTED {
            Outcome::Success
        } else if value == UNTOUCHED {
            Outcome::DidNotRun
        } else {
            Outcome::Erroneous(value)
        }
    }

    pub fn is_success(&self) -> bool { matches!(self, Outcome::Success) }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "kernel successfully set result to 1.0"),
            Outcome::DidNotRun => write!(f, "kernel value stayed at default of 0.0, likely didn't run"),
            Outcome::Erroneous(value) => write!(f, "kernel set result to erroneous value: {value}"),
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub device: DeviceKind,
    pub results: [f32; WORK_ITEMS],
    pub outcome: Outcome,
}
