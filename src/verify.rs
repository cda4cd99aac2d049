//! Output verification.
//!
//! This module compares the outputs read from the IP core with a golden
//! sequence.

use fir_json::Mismatch;

/// Maximum number of mismatches that are logged and kept individually.
pub const MAX_PRINTED_MISMATCHES: usize = 10;

/// Result of comparing an output sequence with a golden sequence.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Comparison {
    /// Number of indices where the output differs from the golden sequence.
    pub mismatches: usize,
    /// The first [`MAX_PRINTED_MISMATCHES`] mismatches.
    pub details: Vec<Mismatch>,
}

impl Comparison {
    /// Returns true if there are no mismatches.
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compares `actual` with `expected` element-wise.
///
/// Indices of `actual` for which `expected` has no value count as
/// mismatches. Values in `expected` beyond the length of `actual` are
/// ignored. The first [`MAX_PRINTED_MISMATCHES`] mismatches are logged
/// individually, followed by a summary of the remaining ones.
pub fn compare(actual: &[i32], expected: &[i32]) -> Comparison {
    let mut comparison = Comparison::default();
    for (index, &actual) in actual.iter().enumerate() {
        let expected = expected.get(index).copied();
        if expected == Some(actual) {
            continue;
        }
        if comparison.mismatches < MAX_PRINTED_MISMATCHES {
            match expected {
                Some(expected) => tracing::warn!(
                    "mismatch at sample {index}: expected {expected}, got {actual}"
                ),
                None => tracing::warn!("mismatch at sample {index}: no golden value, got {actual}"),
            }
            comparison.details.push(Mismatch {
                index,
                expected,
                actual,
            });
        }
        comparison.mismatches += 1;
    }
    if comparison.mismatches > MAX_PRINTED_MISMATCHES {
        tracing::warn!(
            "... and {} more errors",
            comparison.mismatches - MAX_PRINTED_MISMATCHES
        );
    }
    comparison
}
