//! Simulated FIR IP core.
//!
//! This module contains a register-level model of the FIR IP core, together
//! with a mailbox and a timer that record what the driver does. They allow
//! running the driver without hardware, both from the command line and in
//! tests.
//!
//! The model follows the register map in [`crate::regs`]:
//!
//! - Writing START while IDLE starts a run of DATA_LENGTH samples and clears
//!   the delay line.
//! - X_READY is set while the run needs more input and no output is pending.
//! - Writing an input sample computes one output and sets Y_READY.
//! - Reading the output clears Y_READY. After the last output of the run is
//!   read, DONE and IDLE are set.
//!
//! Some faults can be injected to exercise the error paths of the driver.

use crate::board::Timer;
use crate::regs::{self, Mailbox, RegisterInterface, Status, StatusBit};
use anyhow::Result;
use std::collections::VecDeque;

/// Register access recorded by [`SimulatedFir`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Access {
    /// Register read.
    Read {
        /// Register offset.
        offset: usize,
        /// Value returned.
        value: u32,
    },
    /// Register write.
    Write {
        /// Register offset.
        offset: usize,
        /// Value written.
        value: u32,
    },
}

/// Simulated FIR IP core.
#[derive(Debug, Clone)]
pub struct SimulatedFir {
    coefficients: [i32; regs::MAX_TAPS],
    data_length: u32,
    num_taps: u32,
    running: bool,
    done: bool,
    delay_line: VecDeque<i32>,
    output: Option<i32>,
    last_output: i32,
    // outputs read in the current run
    processed: u32,
    // status reads since the last sample transfer
    since_transfer: u32,
    runs: u32,
    ready_delay: u32,
    stall: Option<StatusBit>,
    corrupt_output: Option<(u32, i32)>,
    trace: Vec<Access>,
    violations: usize,
}

impl SimulatedFir {
    /// Creates a simulated IP core in the idle state.
    pub fn new() -> SimulatedFir {
        SimulatedFir {
            coefficients: [0; regs::MAX_TAPS],
            data_length: 0,
            num_taps: 0,
            running: false,
            done: false,
            delay_line: VecDeque::with_capacity(regs::MAX_TAPS),
            output: None,
            last_output: 0,
            processed: 0,
            since_transfer: 0,
            runs: 0,
            ready_delay: 0,
            stall: None,
            corrupt_output: None,
            trace: Vec::new(),
            violations: 0,
        }
    }

    /// Delays X_READY and Y_READY.
    ///
    /// After each sample transfer, the ready bits are only set once the status
    /// register has been read `polls` times.
    pub fn with_ready_delay(mut self, polls: u32) -> SimulatedFir {
        self.ready_delay = polls;
        self
    }

    /// Never sets a status bit.
    pub fn with_stall(mut self, bit: StatusBit) -> SimulatedFir {
        self.stall = Some(bit);
        self
    }

    /// Adds `delta` to the output sample `index` of every run.
    pub fn with_corrupt_output(mut self, index: u32, delta: i32) -> SimulatedFir {
        self.corrupt_output = Some((index, delta));
        self
    }

    /// Gives the current value of the control/status register.
    pub fn status(&self) -> Status {
        let ready = self.since_transfer >= self.ready_delay;
        let status = Status::default()
            .with(StatusBit::Done, self.done)
            .with(StatusBit::Idle, !self.running)
            .with(StatusBit::XReady, self.accepts_input() && ready)
            .with(StatusBit::YReady, self.output.is_some() && ready);
        match self.stall {
            Some(bit) => status.with(bit, false),
            None => status,
        }
    }

    fn accepts_input(&self) -> bool {
        self.running && self.output.is_none() && self.processed < self.data_length
    }

    /// Gives the programmed coefficients.
    pub fn coefficients(&self) -> &[i32] {
        &self.coefficients[..self.num_taps()]
    }

    fn num_taps(&self) -> usize {
        (self.num_taps as usize).min(regs::MAX_TAPS)
    }

    /// Gives the programmed data length.
    pub fn data_length(&self) -> u32 {
        self.data_length
    }

    /// Gives the number of runs started.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Gives all the register accesses done so far.
    pub fn trace(&self) -> &[Access] {
        &self.trace
    }

    /// Gives the input sample writes and output sample reads, in order.
    pub fn transfers(&self) -> impl Iterator<Item = Access> + '_ {
        self.trace.iter().copied().filter(|access| {
            matches!(
                access,
                Access::Write {
                    offset: regs::X_IN,
                    ..
                } | Access::Read {
                    offset: regs::Y_OUT,
                    ..
                }
            )
        })
    }

    /// Gives the number of accesses that violated the handshake protocol.
    ///
    /// These are input writes without X_READY, output reads without Y_READY,
    /// and configuration writes during a run.
    pub fn violations(&self) -> usize {
        self.violations
    }

    fn violation(&mut self, offset: usize) {
        tracing::warn!("protocol violation accessing register {offset:#05x}");
        self.violations += 1;
    }

    fn start(&mut self) {
        if self.running {
            self.violation(regs::CONTROL);
            return;
        }
        self.runs += 1;
        self.running = self.data_length > 0;
        self.done = false;
        self.processed = 0;
        self.output = None;
        self.since_transfer = 0;
        self.delay_line.clear();
        tracing::trace!(run = self.runs, data_length = self.data_length, "start");
    }

    fn push_input(&mut self, x: i32) {
        if !self.accepts_input() {
            self.violation(regs::X_IN);
            return;
        }
        self.delay_line.push_front(x);
        self.delay_line.truncate(regs::MAX_TAPS);
        let y = self
            .delay_line
            .iter()
            .zip(&self.coefficients[..self.num_taps()])
            .fold(0i32, |acc, (&x, &c)| acc.wrapping_add(x.wrapping_mul(c)));
        let y = match self.corrupt_output {
            Some((index, delta)) if index == self.processed => y.wrapping_add(delta),
            _ => y,
        };
        self.output = Some(y);
        self.since_transfer = 0;
    }

    fn pop_output(&mut self) -> i32 {
        let Some(y) = self.output.take() else {
            self.violation(regs::Y_OUT);
            return self.last_output;
        };
        self.last_output = y;
        self.processed += 1;
        self.since_transfer = 0;
        if self.processed == self.data_length {
            self.running = false;
            self.done = true;
        }
        y
    }

    fn configure(&mut self, offset: usize, value: u32) {
        if self.running {
            self.violation(offset);
            return;
        }
        match offset {
            regs::DATA_LENGTH => self.data_length = value,
            regs::NUM_TAPS => self.num_taps = value,
            _ => self.coefficients[(offset - regs::COEFFICIENTS) / 4] = value as i32,
        }
    }
}

impl Default for SimulatedFir {
    fn default() -> SimulatedFir {
        SimulatedFir::new()
    }
}

impl RegisterInterface for SimulatedFir {
    fn read(&mut self, offset: usize) -> u32 {
        let value = match offset {
            regs::CONTROL => {
                let status = self.status();
                self.since_transfer = self.since_transfer.saturating_add(1);
                status.0
            }
            regs::Y_OUT => self.pop_output() as u32,
            regs::DATA_LENGTH => self.data_length,
            regs::NUM_TAPS => self.num_taps,
            regs::COEFFICIENTS..regs::REGION_SIZE => {
                self.coefficients[(offset - regs::COEFFICIENTS) / 4] as u32
            }
            _ => 0,
        };
        self.trace.push(Access::Read { offset, value });
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.trace.push(Access::Write { offset, value });
        tracing::trace!("write {value:#010x} to {offset:#05x}");
        match offset {
            regs::CONTROL => {
                if Status(value).is_set(StatusBit::Start) {
                    self.start();
                }
            }
            regs::X_IN => self.push_input(value as i32),
            regs::DATA_LENGTH | regs::NUM_TAPS | regs::COEFFICIENTS..regs::REGION_SIZE => {
                self.configure(offset, value)
            }
            _ => tracing::warn!("write to unmapped register {offset:#05x}"),
        }
    }
}

/// Mailbox that records the words posted to it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct RecordingMailbox {
    posts: Vec<u32>,
}

impl RecordingMailbox {
    /// Creates an empty mailbox.
    pub fn new() -> RecordingMailbox {
        RecordingMailbox::default()
    }

    /// Gives the words posted so far.
    pub fn posts(&self) -> &[u32] {
        &self.posts
    }
}

impl Mailbox for RecordingMailbox {
    fn post(&mut self, value: u32) {
        tracing::trace!("mailbox {value:#010x}");
        self.posts.push(value);
    }
}

/// Timer that advances a fixed number of ticks on every reading.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StepTimer {
    now: u64,
    step: u64,
}

impl StepTimer {
    /// Creates a timer whose first reading is `start`.
    pub fn new(start: u64, step: u64) -> StepTimer {
        StepTimer { now: start, step }
    }
}

impl Timer for StepTimer {
    fn ticks(&mut self) -> Result<u64> {
        let now = self.now;
        self.now = self.now.wrapping_add(self.step);
        Ok(now)
    }
}
