//! fir-accel CLI arguments.
//!
//! This module contains the definition of the CLI arguments for the fir-accel
//! application.

use crate::driver::{DEFAULT_DATA_LENGTH, DEFAULT_ITERATIONS, DEFAULT_POLL_LIMIT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fir-accel CLI arguments.
#[derive(Parser, Debug, Clone, Eq, PartialEq, Hash)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Command to run
    #[clap(subcommand)]
    pub command: Command,
}

/// fir-accel commands.
#[derive(Subcommand, Debug, Clone, Eq, PartialEq, Hash)]
pub enum Command {
    /// Stream test vectors through the FIR accelerator
    Run(RunArgs),
    /// Filter test vectors with the software FIR filter
    Soft(SoftArgs),
}

/// Arguments of the `run` command.
#[derive(clap::Args, Debug, Clone, Eq, PartialEq, Hash)]
pub struct RunArgs {
    /// Input samples file
    #[clap(long)]
    pub input: PathBuf,
    /// Golden output file (outputs are not verified if omitted)
    #[clap(long)]
    pub golden: Option<PathBuf>,
    /// Number of iterations (at most 10000)
    #[clap(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,
    /// Number of samples in each iteration
    #[clap(long, default_value_t = DEFAULT_DATA_LENGTH)]
    pub data_length: usize,
    /// Comma-separated filter coefficients (defaults to the reference filter)
    #[clap(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub taps: Option<Vec<i32>>,
    /// Maximum number of status register reads while waiting for the IP core
    #[clap(long, default_value_t = DEFAULT_POLL_LIMIT)]
    pub poll_limit: u32,
    /// UIO device name of the FIR IP core
    #[clap(long, default_value = "fir")]
    pub uio: String,
    /// UIO device name of the marker mailbox
    #[clap(long, default_value = "mprj")]
    pub mailbox_uio: String,
    /// Offset in bytes of the mailbox register in its UIO device
    #[clap(long, default_value_t = 0)]
    pub mailbox_offset: usize,
    /// Use a simulated IP core instead of the hardware
    #[clap(long)]
    pub simulate: bool,
    /// Write a JSON report to this file
    #[clap(long)]
    pub report: Option<PathBuf>,
}

/// Arguments of the `soft` command.
#[derive(clap::Args, Debug, Clone, Eq, PartialEq, Hash)]
pub struct SoftArgs {
    /// Input samples file
    #[clap(long)]
    pub input: PathBuf,
    /// Output file, with one sample per line
    #[clap(long)]
    pub output: PathBuf,
    /// Maximum number of samples to read
    #[clap(long, default_value_t = DEFAULT_DATA_LENGTH)]
    pub data_length: usize,
    /// Comma-separated filter coefficients (defaults to the reference filter)
    #[clap(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub taps: Option<Vec<i32>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn run_defaults() {
        let args = Args::parse_from(["fir-accel", "run", "--input", "in.txt"]);
        let Command::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.input, PathBuf::from("in.txt"));
        assert_eq!(run.golden, None);
        assert_eq!(run.iterations, 3);
        assert_eq!(run.data_length, 256);
        assert_eq!(run.taps, None);
        assert_eq!(run.uio, "fir");
        assert!(!run.simulate);
    }

    #[test]
    fn negative_taps() {
        let args = Args::parse_from([
            "fir-accel",
            "soft",
            "--input",
            "in.txt",
            "--output",
            "out.txt",
            "--taps",
            "-10,0,23",
        ]);
        let Command::Soft(soft) = args.command else {
            panic!("expected soft command");
        };
        assert_eq!(soft.taps, Some(vec![-10, 0, 23]));
    }
}
