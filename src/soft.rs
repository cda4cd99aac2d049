//! Software FIR filter.
//!
//! This module contains a direct-form FIR convolution over fixed-size
//! buffers. It computes the same outputs as the FIR accelerator, so it can be
//! used to produce golden sequences for the testbench.
//!
//! The output sample `i` is the sum of `taps[j] * input[i - j]` over all the
//! delays `i - j` that fall inside the input buffer. There is no history
//! before the first sample and no wraparound, so near the start of the buffer
//! fewer taps contribute.

/// Errors produced by the software FIR filter.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The input buffer is empty.
    #[error("input buffer is empty")]
    EmptyInput,
    /// There are more taps than input samples.
    #[error("{taps} taps do not fit in a buffer of {samples} samples")]
    TooManyTaps {
        /// Number of taps.
        taps: usize,
        /// Number of input samples.
        samples: usize,
    },
    /// The output buffer length does not match the input buffer length.
    #[error("output buffer has {output} samples but input has {input} samples")]
    OutputLength {
        /// Output buffer length.
        output: usize,
        /// Input buffer length.
        input: usize,
    },
}

/// Filters `input` with the FIR filter given by `taps`.
///
/// Returns a newly allocated output buffer with the same length as `input`.
///
/// # Examples
///
/// ```
/// let output = fir_accel::soft::compute(&[1, 1], &[1, 2, 3]).unwrap();
/// assert_eq!(output, [1, 3, 5]);
/// ```
pub fn compute(taps: &[i32], input: &[i32]) -> Result<Vec<i32>, Error> {
    let mut output = vec![0; input.len()];
    compute_into(taps, input, &mut output)?;
    Ok(output)
}

/// Filters `input` with the FIR filter given by `taps`, writing the result
/// into `output`.
///
/// The output buffer is cleared before accumulating, so its previous contents
/// are irrelevant and calling this function repeatedly with the same
/// arguments always gives the same result.
///
/// Multiplications and additions wrap around on overflow, as a 32-bit
/// accumulator does.
pub fn compute_into(taps: &[i32], input: &[i32], output: &mut [i32]) -> Result<(), Error> {
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }
    if taps.len() > input.len() {
        return Err(Error::TooManyTaps {
            taps: taps.len(),
            samples: input.len(),
        });
    }
    if output.len() != input.len() {
        return Err(Error::OutputLength {
            output: output.len(),
            input: input.len(),
        });
    }

    output.fill(0);
    for (i, y) in output.iter_mut().enumerate() {
        // taps beyond taps.len() are zero, so only min(i + 1, taps.len())
        // delays contribute
        for (j, &tap) in taps.iter().enumerate().take(i + 1) {
            *y = y.wrapping_add(tap.wrapping_mul(input[i - j]));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::REFERENCE_TAPS;

    // Straightforward double loop over all the delays.
    fn naive(taps: &[i32], input: &[i32]) -> Vec<i32> {
        let n = input.len();
        let mut padded = vec![0; n];
        padded[..taps.len()].copy_from_slice(taps);
        let mut output = vec![0i32; n];
        for (i, y) in output.iter_mut().enumerate() {
            for (j, &tap) in padded.iter().enumerate() {
                if j <= i {
                    *y = y.wrapping_add(tap.wrapping_mul(input[i - j]));
                }
            }
        }
        output
    }

    fn ramp(n: i32) -> Vec<i32> {
        (1..=n).collect()
    }

    #[test]
    fn output_length() {
        for n in 1..20 {
            let input = ramp(n);
            let taps = &REFERENCE_TAPS[..REFERENCE_TAPS.len().min(input.len())];
            assert_eq!(compute(taps, &input).unwrap().len(), input.len());
        }
    }

    #[test]
    fn zero_taps() {
        let output = compute(&[0; 11], &ramp(16)).unwrap();
        assert!(output.iter().all(|&y| y == 0));
        let output = compute(&[], &ramp(16)).unwrap();
        assert!(output.iter().all(|&y| y == 0));
    }

    #[test]
    fn unit_tap() {
        let input = [5, -3, 0, 7, i32::MAX, i32::MIN];
        assert_eq!(compute(&[1], &input).unwrap(), input);
    }

    #[test]
    fn reference_taps() {
        let input = ramp(16);
        let output = compute(&REFERENCE_TAPS, &input).unwrap();
        assert_eq!(output[0], 0);
        // taps[0..=5] against input[5], input[4], ..., input[0]
        let expected_5: i32 = (0..=5).map(|j| REFERENCE_TAPS[j] * input[5 - j]).sum();
        assert_eq!(expected_5, -50 - 36 + 69 + 112 + 63);
        assert_eq!(output[5], expected_5);
        assert_eq!(output[1], -10);
        assert_eq!(output[2], -10 * 2 - 9);
        assert_eq!(output, naive(&REFERENCE_TAPS, &input));
    }

    #[test]
    fn matches_naive() {
        let input: Vec<i32> = (0..64).map(|n| (n * 37 % 101) - 50).collect();
        for num_taps in [1, 2, 11, 32, 64] {
            let taps: Vec<i32> = (0..num_taps).map(|n| 3 - n).collect();
            assert_eq!(compute(&taps, &input).unwrap(), naive(&taps, &input));
        }
    }

    #[test]
    fn idempotent() {
        let input = ramp(16);
        let first = compute(&REFERENCE_TAPS, &input).unwrap();
        let second = compute(&REFERENCE_TAPS, &input).unwrap();
        assert_eq!(first, second);

        let mut output = vec![1234; input.len()];
        compute_into(&REFERENCE_TAPS, &input, &mut output).unwrap();
        assert_eq!(output, first);
        compute_into(&REFERENCE_TAPS, &input, &mut output).unwrap();
        assert_eq!(output, first);
    }

    #[test]
    fn wrapping() {
        let output = compute(&[2], &[i32::MAX]).unwrap();
        assert_eq!(output, [-2]);
    }

    #[test]
    fn preconditions() {
        assert_eq!(compute(&[1], &[]), Err(Error::EmptyInput));
        assert_eq!(
            compute(&[1, 2, 3], &[1, 2]),
            Err(Error::TooManyTaps {
                taps: 3,
                samples: 2
            })
        );
        let mut output = [0; 3];
        assert_eq!(
            compute_into(&[1], &[1, 2], &mut output),
            Err(Error::OutputLength {
                output: 3,
                input: 2
            })
        );
    }
}
