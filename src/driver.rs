//! FIR accelerator driver.
//!
//! This module contains the driver that streams samples through the FIR IP
//! core. A run consists of several iterations. In each iteration the driver
//! programs the coefficients and the data length, posts a start marker to the
//! mailbox, exchanges one input and one output sample at a time using the
//! X_READY and Y_READY handshake, and finally posts an end marker. If a golden
//! sequence is given, the outputs of each iteration are verified against it.
//!
//! Every wait on a status bit is bounded by the poll limit of the
//! [`DriverConfig`]. A wait that exceeds the limit aborts the current
//! iteration with a [`Timeout`], and the run continues with the next
//! iteration.

use crate::board::{PinConfiguration, Timer};
use crate::regs::{self, Mailbox, RegisterInterface, Status, StatusBit};
use crate::verify;
use anyhow::{Context, Result};
use fir_json::{IterationReport, RunReport, Verdict};

/// Reference filter coefficients.
pub const REFERENCE_TAPS: [i32; 11] = [0, -10, -9, 23, 56, 63, 56, 23, -9, -10, 0];

/// Default number of iterations in a run.
pub const DEFAULT_ITERATIONS: usize = 3;

/// Default number of samples streamed in each iteration.
pub const DEFAULT_DATA_LENGTH: usize = 256;

/// Default maximum number of status register reads for each wait.
pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;

/// Maximum number of iterations in a run.
///
/// The report keeps the outputs of every iteration in memory.
pub const MAX_ITERATIONS: usize = 10_000;

// Progress is logged every this many samples.
const PROGRESS_INTERVAL: usize = 32;

/// Timeout waiting for a status bit.
#[derive(thiserror::Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[error("timed out waiting for {bit} after {polls} polls")]
pub struct Timeout {
    /// Status bit that was never set.
    pub bit: StatusBit,
    /// Number of times that the status register was read.
    pub polls: u32,
}

/// Driver run configuration.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DriverConfig {
    taps: Vec<i32>,
    data_length: usize,
    iterations: usize,
    poll_limit: u32,
}

impl DriverConfig {
    /// Creates a driver configuration.
    ///
    /// Fails if there are more taps than the IP core supports or than samples
    /// in the data length, if the data length or the poll limit are zero, or
    /// if the number of iterations is not between 1 and [`MAX_ITERATIONS`].
    pub fn new(
        taps: Vec<i32>,
        data_length: usize,
        iterations: usize,
        poll_limit: u32,
    ) -> Result<DriverConfig> {
        if taps.len() > regs::MAX_TAPS {
            anyhow::bail!(
                "{} taps given, but the IP core supports at most {}",
                taps.len(),
                regs::MAX_TAPS
            );
        }
        if data_length == 0 || u32::try_from(data_length).is_err() {
            anyhow::bail!("invalid data length: {data_length}");
        }
        if taps.len() > data_length {
            anyhow::bail!(
                "{} taps given, but the data length is only {data_length}",
                taps.len()
            );
        }
        if !(1..=MAX_ITERATIONS).contains(&iterations) {
            anyhow::bail!("the number of iterations must be between 1 and {MAX_ITERATIONS}");
        }
        if poll_limit == 0 {
            anyhow::bail!("poll limit must be at least 1");
        }
        Ok(DriverConfig {
            taps,
            data_length,
            iterations,
            poll_limit,
        })
    }

    /// Returns a copy of the configuration with a different data length.
    pub fn with_data_length(&self, data_length: usize) -> Result<DriverConfig> {
        DriverConfig::new(
            self.taps.clone(),
            data_length,
            self.iterations,
            self.poll_limit,
        )
    }

    /// Filter coefficients.
    pub fn taps(&self) -> &[i32] {
        &self.taps
    }

    /// Number of samples streamed in each iteration.
    pub fn data_length(&self) -> usize {
        self.data_length
    }

    /// Number of iterations in a run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl Default for DriverConfig {
    fn default() -> DriverConfig {
        DriverConfig {
            taps: REFERENCE_TAPS.to_vec(),
            data_length: DEFAULT_DATA_LENGTH,
            iterations: DEFAULT_ITERATIONS,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

/// Driver state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum State {
    /// No iteration has been started.
    Idle,
    /// Coefficients and lengths have been written to the IP core.
    CoefficientsProgrammed,
    /// Samples are being exchanged with the IP core.
    StreamingSamples,
    /// All the samples of the current iteration have been exchanged.
    IterationComplete,
    /// All the iterations have finished.
    Done,
}

/// FIR accelerator driver.
///
/// The driver owns the register interface of the IP core, the mailbox used for
/// the start and end markers, and the timer used for latency measurements.
#[derive(Debug)]
pub struct Driver<R, M, T> {
    registers: R,
    mailbox: M,
    timer: T,
    config: DriverConfig,
    state: State,
}

#[derive(Debug)]
struct Stream {
    outputs: Vec<i32>,
    latency: u64,
}

impl<R: RegisterInterface, M: Mailbox, T: Timer> Driver<R, M, T> {
    /// Creates a new driver.
    pub fn new(registers: R, mailbox: M, timer: T, config: DriverConfig) -> Driver<R, M, T> {
        Driver {
            registers,
            mailbox,
            timer,
            config,
            state: State::Idle,
        }
    }

    /// Gives the current state of the driver.
    pub fn state(&self) -> State {
        self.state
    }

    /// Gives access to the register interface.
    pub fn registers(&self) -> &R {
        &self.registers
    }

    /// Gives access to the mailbox.
    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    /// Runs all the iterations.
    ///
    /// The `input` must contain exactly [`DriverConfig::data_length`]
    /// samples. If `golden` is given, the outputs of each iteration are
    /// compared with it, and the run only passes if there are no mismatches.
    /// Without `golden`, the run passes if all the iterations complete.
    ///
    /// Timeouts and mismatches are recorded in the returned report. This
    /// function only returns `Err` for errors that prevent running at all,
    /// such as an input of the wrong length or a failing timer.
    #[tracing::instrument(name = "Driver::run", level = "debug", skip_all)]
    pub fn run<P: PinConfiguration>(
        &mut self,
        pins: &mut P,
        input: &[i32],
        golden: Option<&[i32]>,
    ) -> Result<RunReport> {
        if input.len() != self.config.data_length {
            anyhow::bail!(
                "input has {} samples, but the data length is {}",
                input.len(),
                self.config.data_length
            );
        }
        pins.configure_pins().context("failed to configure pins")?;

        let mut iterations = Vec::new();
        let mut total_latency: u64 = 0;
        let mut passed = true;
        for iteration in 1..=self.config.iterations {
            tracing::info!("starting iteration {iteration}");
            let report = self.run_iteration(iteration, input, golden)?;
            if let Some(latency) = report.latency {
                tracing::info!("iteration {iteration} latency: {latency} ticks");
                total_latency = total_latency.wrapping_add(latency);
            }
            passed &= report.verdict.passed();
            iterations.push(report);
        }
        self.set_state(State::Done);

        let average_latency = total_latency / self.config.iterations as u64;
        tracing::info!(
            "total latency across {} iterations: {total_latency} ticks",
            self.config.iterations
        );
        tracing::info!("average latency: {average_latency} ticks");
        let verdict = Verdict::from_passed(passed);
        match (verdict, golden.is_some()) {
            (Verdict::Pass, true) => {
                tracing::info!("TEST {verdict} - all iterations matched golden output")
            }
            (Verdict::Pass, false) => tracing::info!("TEST {verdict} - all iterations completed"),
            (Verdict::Fail, _) => tracing::error!("TEST {verdict} - some iterations failed"),
        }

        Ok(RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            datetime: chrono::Utc::now().to_rfc3339(),
            data_length: self.config.data_length,
            taps: self.config.taps.clone(),
            verified: golden.is_some(),
            iterations,
            total_latency,
            average_latency,
            verdict,
        })
    }

    fn run_iteration(
        &mut self,
        iteration: usize,
        input: &[i32],
        golden: Option<&[i32]>,
    ) -> Result<IterationReport> {
        let stream = match self.stream(input) {
            Ok(stream) => stream,
            Err(err) => {
                // only timeouts are recoverable
                let timeout = err.downcast::<Timeout>()?;
                tracing::error!("iteration {iteration} aborted: {timeout}");
                return Ok(IterationReport {
                    iteration,
                    latency: None,
                    final_output: None,
                    outputs: Vec::new(),
                    mismatches: None,
                    mismatch_details: Vec::new(),
                    error: Some(timeout.to_string()),
                    verdict: Verdict::Fail,
                });
            }
        };

        let (mismatches, mismatch_details, passed) = match golden {
            Some(golden) => {
                let comparison = verify::compare(&stream.outputs, golden);
                if comparison.passed() {
                    tracing::info!("iteration {iteration} passed verification");
                } else {
                    tracing::error!(
                        "iteration {iteration} failed with {} mismatches",
                        comparison.mismatches
                    );
                }
                let passed = comparison.passed();
                (Some(comparison.mismatches), comparison.details, passed)
            }
            None => (None, Vec::new(), true),
        };

        Ok(IterationReport {
            iteration,
            latency: Some(stream.latency),
            final_output: stream.outputs.last().copied(),
            outputs: stream.outputs,
            mismatches,
            mismatch_details,
            error: None,
            verdict: Verdict::from_passed(passed),
        })
    }

    fn stream(&mut self, input: &[i32]) -> Result<Stream> {
        self.program()?;

        self.mailbox.post(regs::START_MARK);
        tracing::info!("sent start mark ({:#04x})", regs::START_MARK >> 16);
        let start = self.timer.ticks()?;
        self.registers.write(regs::CONTROL, StatusBit::Start.mask());
        self.set_state(State::StreamingSamples);

        let mut outputs = Vec::with_capacity(input.len());
        for (n, &x) in input.iter().enumerate() {
            self.wait_for(StatusBit::XReady)?;
            self.registers.write(regs::X_IN, x as u32);
            self.wait_for(StatusBit::YReady)?;
            outputs.push(self.registers.read(regs::Y_OUT) as i32);
            if (n + 1) % PROGRESS_INTERVAL == 0 {
                tracing::info!("processed {}/{} samples", n + 1, input.len());
            }
        }
        self.wait_for(StatusBit::Done)?;

        let final_output = outputs.last().copied().unwrap_or_default();
        self.mailbox.post(regs::end_mark(final_output));
        tracing::info!(
            "sent end mark ({:#04x}) with final output {final_output}",
            regs::END_MARK >> 16
        );
        let end = self.timer.ticks()?;
        self.set_state(State::IterationComplete);

        Ok(Stream {
            outputs,
            latency: end.wrapping_sub(start),
        })
    }

    fn program(&mut self) -> Result<(), Timeout> {
        // the previous stream must be fully drained before reprogramming
        self.wait_for(StatusBit::Idle)?;
        for (tap, &coefficient) in self.config.taps.iter().enumerate() {
            self.registers
                .write(regs::coefficient(tap), coefficient as u32);
        }
        // the lengths fit in u32, as checked by DriverConfig::new
        self.registers
            .write(regs::DATA_LENGTH, self.config.data_length as u32);
        self.registers
            .write(regs::NUM_TAPS, self.config.taps.len() as u32);
        tracing::debug!(
            num_taps = self.config.taps.len(),
            data_length = self.config.data_length,
            "programmed coefficients"
        );
        self.set_state(State::CoefficientsProgrammed);
        Ok(())
    }

    fn wait_for(&mut self, bit: StatusBit) -> Result<(), Timeout> {
        let polls = self.config.poll_limit;
        for _ in 0..polls {
            if Status(self.registers.read(regs::CONTROL)).is_set(bit) {
                return Ok(());
            }
            std::hint::spin_loop();
        }
        Err(Timeout { bit, polls })
    }

    fn set_state(&mut self, state: State) {
        tracing::debug!(from = ?self.state, to = ?state, "driver state");
        self.state = state;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{Access, RecordingMailbox, SimulatedFir, StepTimer};
    use crate::soft;

    type SimDriver = Driver<SimulatedFir, RecordingMailbox, StepTimer>;

    const STEP: u64 = 1000;

    fn triangle(n: usize) -> Vec<i32> {
        (0..n as i32).map(|k| 32 - (k % 64 - 32).abs()).collect()
    }

    fn sim_driver(sim: SimulatedFir, data_length: usize) -> SimDriver {
        let config = DriverConfig::new(REFERENCE_TAPS.to_vec(), data_length, 3, 100).unwrap();
        Driver::new(sim, RecordingMailbox::new(), StepTimer::new(0, STEP), config)
    }

    #[test]
    fn golden_pass() {
        let input = triangle(DEFAULT_DATA_LENGTH);
        let golden = soft::compute(&REFERENCE_TAPS, &input).unwrap();
        let mut driver = sim_driver(SimulatedFir::new(), input.len());
        let report = driver.run(&mut (), &input, Some(&golden)).unwrap();

        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.verified);
        assert_eq!(report.iterations.len(), 3);
        for (n, iteration) in report.iterations.iter().enumerate() {
            assert_eq!(iteration.iteration, n + 1);
            assert_eq!(iteration.mismatches, Some(0));
            assert_eq!(iteration.outputs, golden);
            assert_eq!(iteration.final_output, golden.last().copied());
            assert_eq!(iteration.verdict, Verdict::Pass);
        }
        assert_eq!(driver.state(), State::Done);
    }

    #[test]
    fn corrupted_golden_fails() {
        let input = triangle(64);
        let mut golden = soft::compute(&REFERENCE_TAPS, &input).unwrap();
        golden[17] += 1;
        let mut driver = sim_driver(SimulatedFir::new(), input.len());
        let report = driver.run(&mut (), &input, Some(&golden)).unwrap();

        assert_eq!(report.verdict, Verdict::Fail);
        for iteration in &report.iterations {
            assert_eq!(iteration.mismatches, Some(1));
            assert_eq!(iteration.mismatch_details[0].index, 17);
            assert_eq!(iteration.verdict, Verdict::Fail);
        }
    }

    #[test]
    fn corrupted_output_fails() {
        let input = triangle(64);
        let golden = soft::compute(&REFERENCE_TAPS, &input).unwrap();
        let sim = SimulatedFir::new().with_corrupt_output(40, 3);
        let mut driver = sim_driver(sim, input.len());
        let report = driver.run(&mut (), &input, Some(&golden)).unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.iterations[0].outputs[40], golden[40] + 3);
        assert_eq!(report.iterations[0].mismatches, Some(1));
    }

    #[test]
    fn without_golden() {
        let input = triangle(40);
        let mut driver = sim_driver(SimulatedFir::new(), input.len());
        let report = driver.run(&mut (), &input, None).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(!report.verified);
        assert!(report.iterations.iter().all(|it| it.mismatches.is_none()));
    }

    #[test]
    fn strict_alternation() {
        let input = triangle(50);
        let mut driver = sim_driver(SimulatedFir::new().with_ready_delay(3), input.len());
        driver.run(&mut (), &input, None).unwrap();

        let sim = driver.registers();
        let transfers: Vec<Access> = sim.transfers().collect();
        assert_eq!(transfers.len(), 2 * 3 * input.len());
        for pair in transfers.chunks(2) {
            assert!(matches!(pair[0], Access::Write { offset: regs::X_IN, .. }));
            assert!(matches!(pair[1], Access::Read { offset: regs::Y_OUT, .. }));
        }
        let writes = transfers
            .iter()
            .filter(|a| matches!(a, Access::Write { .. }))
            .count();
        assert_eq!(writes, 3 * input.len());
        assert_eq!(sim.violations(), 0);
        assert_eq!(sim.runs(), 3);
    }

    #[test]
    fn programs_before_start() {
        let input = triangle(20);
        let mut driver = sim_driver(SimulatedFir::new(), input.len());
        driver.run(&mut (), &input, None).unwrap();

        let sim = driver.registers();
        assert_eq!(sim.coefficients(), REFERENCE_TAPS);
        assert_eq!(sim.data_length(), 20);
        // within each iteration, configuration writes come before START and
        // before the first input sample
        let trace = sim.trace();
        let start = trace
            .iter()
            .position(|a| {
                matches!(a, Access::Write { offset: regs::CONTROL, value } if *value == StatusBit::Start.mask())
            })
            .unwrap();
        let config_writes = trace[..start]
            .iter()
            .filter(|a| matches!(a, Access::Write { .. }))
            .count();
        assert_eq!(config_writes, REFERENCE_TAPS.len() + 2);
        assert!(trace[..start]
            .iter()
            .all(|a| !matches!(a, Access::Write { offset: regs::X_IN, .. })));
    }

    #[test]
    fn markers_and_latency() {
        let input = triangle(33);
        let mut driver = sim_driver(SimulatedFir::new(), input.len());
        let report = driver.run(&mut (), &input, None).unwrap();

        let final_output = report.iterations[0].final_output.unwrap();
        let end = regs::end_mark(final_output);
        assert_eq!(
            driver.mailbox().posts(),
            [regs::START_MARK, end, regs::START_MARK, end, regs::START_MARK, end]
        );
        assert!(report
            .iterations
            .iter()
            .all(|it| it.latency == Some(STEP)));
        assert_eq!(report.total_latency, 3 * STEP);
        assert_eq!(report.average_latency, STEP);
    }

    #[test]
    fn latency_wraps() {
        let input = triangle(8);
        let config = DriverConfig::new(REFERENCE_TAPS[..8].to_vec(), 8, 1, 10).unwrap();
        let timer = StepTimer::new(u64::MAX - 10, 25);
        let mut driver = Driver::new(SimulatedFir::new(), RecordingMailbox::new(), timer, config);
        let report = driver.run(&mut (), &input, None).unwrap();
        assert_eq!(report.total_latency, 25);
    }

    #[test]
    fn timeout_does_not_hang() {
        let input = triangle(16);
        let sim = SimulatedFir::new().with_stall(StatusBit::YReady);
        let mut driver = sim_driver(sim, input.len());
        let report = driver.run(&mut (), &input, None).unwrap();

        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.iterations.len(), 3);
        let first = &report.iterations[0];
        assert_eq!(
            first.error.as_deref(),
            Some("timed out waiting for Y_READY after 100 polls")
        );
        assert_eq!(first.latency, None);
        // the IP core is still busy, so the next iterations cannot program it
        let second = &report.iterations[1];
        assert_eq!(
            second.error.as_deref(),
            Some("timed out waiting for IDLE after 100 polls")
        );
        assert_eq!(report.total_latency, 0);
    }

    #[test]
    fn slow_core_within_poll_limit() {
        let input = triangle(16);
        let golden = soft::compute(&REFERENCE_TAPS, &input).unwrap();
        let mut driver = sim_driver(SimulatedFir::new().with_ready_delay(99), input.len());
        let report = driver.run(&mut (), &input, Some(&golden)).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);

        let mut driver = sim_driver(SimulatedFir::new().with_ready_delay(100), input.len());
        let report = driver.run(&mut (), &input, Some(&golden)).unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report.iterations[0]
            .error
            .as_deref()
            .unwrap()
            .contains("X_READY"));
    }

    #[test]
    fn wrong_input_length() {
        let mut driver = sim_driver(SimulatedFir::new(), 16);
        assert!(driver.run(&mut (), &triangle(15), None).is_err());
        assert_eq!(driver.state(), State::Idle);
    }

    #[test]
    fn config_validation() {
        assert!(DriverConfig::new(vec![1; regs::MAX_TAPS + 1], 64, 3, 10).is_err());
        assert!(DriverConfig::new(vec![1; regs::MAX_TAPS], 64, 3, 10).is_ok());
        assert!(DriverConfig::new(vec![1], 0, 3, 10).is_err());
        assert!(DriverConfig::new(vec![1], 64, 0, 10).is_err());
        assert!(DriverConfig::new(vec![1], 64, MAX_ITERATIONS, 10).is_ok());
        assert!(DriverConfig::new(vec![1], 64, MAX_ITERATIONS + 1, 10).is_err());
        assert!(DriverConfig::new(vec![1], 64, usize::MAX, 10).is_err());
        assert!(DriverConfig::new(vec![1], 64, 3, 0).is_err());
        // no more taps than samples
        assert!(DriverConfig::new(REFERENCE_TAPS.to_vec(), 11, 1, 10).is_ok());
        assert!(DriverConfig::new(REFERENCE_TAPS.to_vec(), 5, 1, 10).is_err());
        let config = DriverConfig::default();
        assert_eq!(config.taps(), REFERENCE_TAPS);
        assert_eq!(config.iterations(), DEFAULT_ITERATIONS);
        assert_eq!(config.with_data_length(16).unwrap().data_length(), 16);
        assert!(config.with_data_length(10).is_err());
    }

    #[test]
    fn many_iterations() {
        let input = triangle(16);
        let config = DriverConfig::new(REFERENCE_TAPS.to_vec(), 16, MAX_ITERATIONS, 10).unwrap();
        let timer = StepTimer::new(0, STEP);
        let mut driver = Driver::new(SimulatedFir::new(), RecordingMailbox::new(), timer, config);
        let report = driver.run(&mut (), &input, None).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.iterations.len(), MAX_ITERATIONS);
        assert_eq!(report.average_latency, STEP);
    }
}
