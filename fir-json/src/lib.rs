//! fir-json contains the JSON schema of the report written by fir-accel after
//! streaming samples through the FIR accelerator.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Run report JSON schema.
///
/// This JSON schema corresponds to the file written by `fir-accel run
/// --report`. It summarizes all the iterations of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunReport {
    /// fir-accel version that produced the report.
    pub version: String,
    /// UTC time at which the run finished, in RFC 3339 format.
    pub datetime: String,
    /// Number of samples streamed in each iteration.
    pub data_length: usize,
    /// Filter coefficients programmed into the accelerator.
    pub taps: Vec<i32>,
    /// Whether a golden sequence was used to verify the outputs.
    pub verified: bool,
    /// Per-iteration results.
    pub iterations: Vec<IterationReport>,
    /// Sum of the latencies of all the completed iterations, in timer ticks.
    pub total_latency: u64,
    /// Total latency divided by the number of iterations, in timer ticks.
    pub average_latency: u64,
    /// Overall verdict.
    pub verdict: Verdict,
}

/// Iteration report JSON schema.
///
/// Contains the results of a single iteration of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Iteration number, starting at 1.
    pub iteration: usize,
    /// Latency of the iteration in timer ticks.
    ///
    /// This is `None` if the iteration was aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    /// Last output sample, which is also sent in the end marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<i32>,
    /// Output samples read from the accelerator.
    pub outputs: Vec<i32>,
    /// Number of outputs that differ from the golden sequence.
    ///
    /// This is `None` if no golden sequence was given or if the iteration was
    /// aborted before verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatches: Option<usize>,
    /// First mismatches found during verification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatch_details: Vec<Mismatch>,
    /// Error that aborted the iteration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Iteration verdict.
    pub verdict: Verdict,
}

/// Mismatch JSON schema.
///
/// Describes an output sample that differs from the golden sequence.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Mismatch {
    /// Sample index.
    pub index: usize,
    /// Golden value, or `None` if the golden sequence is shorter than the
    /// output.
    pub expected: Option<i32>,
    /// Value read from the accelerator.
    pub actual: i32,
}

/// Test verdict.
///
/// It is serialized as `"PASSED"` or `"FAILED"`, the same as its
/// [`Display`](std::fmt::Display) implementation.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    /// All checks passed.
    #[serde(rename = "PASSED")]
    Pass,
    /// At least one check failed.
    #[serde(rename = "FAILED")]
    Fail,
}

impl Verdict {
    /// Returns [`Verdict::Pass`] if `passed` is true and [`Verdict::Fail`]
    /// otherwise.
    pub fn from_passed(passed: bool) -> Verdict {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Returns true if the verdict is [`Verdict::Pass`].
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

macro_rules! impl_str_conv {
    ($ty:ty, $($s:expr => $v:ident),*) => {
        impl std::str::FromStr for $ty {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, ()> {
                Ok(match s {
                    $(
                        $s => <$ty>::$v,
                    )*
                        _ => return Err(()),
                })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                write!(f, "{}", match self {
                    $(
                        <$ty>::$v => $s,
                    )*
                })
            }
        }
    }
}

impl_str_conv!(Verdict,
               "PASSED" => Pass,
               "FAILED" => Fail);
