//! fir-accel application.
//!
//! This module contains a top-level structure [`App`] that loads the test
//! vectors, opens the FIR IP core (or its simulation) and runs the driver, as
//! well as the implementation of the `soft` command.

use crate::{
    args::{RunArgs, SoftArgs},
    board::{MonotonicClock, Timer},
    driver::{Driver, DriverConfig, REFERENCE_TAPS},
    fpga::{UioMailbox, UioRegisters},
    regs::{Mailbox, RegisterInterface},
    sim::{RecordingMailbox, SimulatedFir},
    soft, vectors,
};
use anyhow::{Context, Result};
use fir_json::RunReport;
use std::path::PathBuf;

/// fir-accel application.
///
/// This struct owns the driver and the test vectors of a run.
#[derive(Debug)]
pub struct App {
    peripheral: Peripheral,
    input: Vec<i32>,
    golden: Option<Vec<i32>>,
    report: Option<PathBuf>,
}

#[derive(Debug)]
enum Peripheral {
    Hardware(Driver<UioRegisters, UioMailbox, MonotonicClock>),
    Simulated(Driver<SimulatedFir, RecordingMailbox, MonotonicClock>),
}

impl App {
    /// Creates a new application.
    ///
    /// Loads the test vectors and opens the IP core. If the input file has
    /// fewer samples than the data length, the data length is reduced to the
    /// number of samples read. This fails if fewer samples than taps are
    /// read.
    #[tracing::instrument(name = "App::new", level = "debug")]
    pub async fn new(args: &RunArgs) -> Result<App> {
        let taps = args.taps.clone().unwrap_or_else(|| REFERENCE_TAPS.to_vec());
        let config = DriverConfig::new(taps, args.data_length, args.iterations, args.poll_limit)?;

        let input = vectors::load(&args.input, config.data_length()).await?;
        if input.values.is_empty() {
            anyhow::bail!("no samples in {}", args.input.display());
        }
        let config = if input.is_short() {
            tracing::warn!(
                "reducing data length from {} to {}",
                config.data_length(),
                input.values.len()
            );
            config.with_data_length(input.values.len())?
        } else {
            config
        };
        let golden = match &args.golden {
            Some(path) => Some(vectors::load(path, config.data_length()).await?.values),
            None => None,
        };

        let peripheral = if args.simulate {
            tracing::info!("using simulated FIR IP core");
            Peripheral::Simulated(Driver::new(
                SimulatedFir::new(),
                RecordingMailbox::new(),
                MonotonicClock::new(),
                config,
            ))
        } else {
            let registers = UioRegisters::open(&args.uio).await?;
            let mailbox = UioMailbox::open(&args.mailbox_uio, args.mailbox_offset).await?;
            Peripheral::Hardware(Driver::new(
                registers,
                mailbox,
                MonotonicClock::new(),
                config,
            ))
        };

        Ok(App {
            peripheral,
            input: input.values,
            golden,
            report: args.report.clone(),
        })
    }

    /// Runs the application.
    ///
    /// Returns the run report. The report is also written to a file if
    /// requested in the arguments.
    #[tracing::instrument(name = "App::run", level = "debug", skip_all)]
    pub async fn run(self) -> Result<RunReport> {
        let App {
            peripheral,
            input,
            golden,
            report: report_path,
        } = self;
        let report = match peripheral {
            Peripheral::Hardware(driver) => run_driver(driver, input, golden).await?,
            Peripheral::Simulated(driver) => run_driver(driver, input, golden).await?,
        };
        if let Some(path) = report_path {
            let json = serde_json::to_string_pretty(&report)?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("failed to write report {}", path.display()))?;
            tracing::info!("wrote report to {}", path.display());
        }
        Ok(report)
    }
}

// The driver busy-waits on the IP core, so it runs on a blocking thread.
async fn run_driver<R, M, T>(
    mut driver: Driver<R, M, T>,
    input: Vec<i32>,
    golden: Option<Vec<i32>>,
) -> Result<RunReport>
where
    R: RegisterInterface + Send + 'static,
    M: Mailbox + Send + 'static,
    T: Timer + Send + 'static,
{
    tokio::task::spawn_blocking(move || driver.run(&mut (), &input, golden.as_deref()))
        .await
        .context("driver task failed")?
}

/// Runs the `soft` command.
///
/// Filters the input file with the software FIR filter and writes the result
/// to the output file. The output can be used as a golden file for `run`.
pub async fn run_soft(args: &SoftArgs) -> Result<()> {
    let taps = args.taps.clone().unwrap_or_else(|| REFERENCE_TAPS.to_vec());
    let input = vectors::load(&args.input, args.data_length).await?;
    let output = soft::compute(&taps, &input.values)
        .with_context(|| format!("failed to filter {}", args.input.display()))?;
    vectors::store(&args.output, &output).await
}
