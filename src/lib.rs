//! fir-accel is a direct-form FIR filter implemented in software, together
//! with a driver and testbench for a memory-mapped FIR accelerator IP core.
//! The driver programs the filter coefficients, streams samples through the IP
//! core using a ready/valid style handshake on its status register, signals
//! start and end markers through a mailbox register, measures latency, and
//! verifies the outputs against a golden sequence.
//!
//! The IP core is accessed through UIO on the target, or through a
//! register-level simulation of it.

#![warn(missing_docs)]

pub mod app;
pub mod args;
pub mod board;
pub mod driver;
pub mod fpga;
pub mod regs;
pub mod sim;
pub mod soft;
pub mod uio;
pub mod vectors;
pub mod verify;
