use anyhow::Result;
use clap::Parser;
use fir_accel::{
    app::{self, App},
    args::{Args, Command},
};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Args::parse().command {
        Command::Run(args) => {
            let report = App::new(&args).await?.run().await?;
            Ok(if report.verdict.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Soft(args) => {
            app::run_soft(&args).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
