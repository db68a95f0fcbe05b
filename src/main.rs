//! pv-sim entry point: CLI parsing, logging setup and command dispatch.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use pv_sim::cli::{Cli, Command};
use pv_sim::config::SimulationConfig;
use pv_sim::error::Result;
use pv_sim::logging::init_tracing;
use pv_sim::runner;
use pv_sim::shutdown::Shutdown;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let (trigger, shutdown) = Shutdown::pair();
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            warn!(?err, "failed to install Ctrl+C handler");
            return;
        }
        info!("interrupt received, shutting down");
        trigger.trigger();
    });

    match run(&cli.command, &config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &Command, config: &SimulationConfig, shutdown: Shutdown) -> Result<()> {
    match command {
        Command::Relay { .. } => runner::run_relay(config, shutdown).await,
        Command::Meter { .. } => {
            runner::run_meter(config, shutdown).await?;
            Ok(())
        }
        Command::Pv { .. } => {
            let report = runner::run_pv(config, shutdown).await?;
            println!("{}", report.stats);
            Ok(())
        }
        Command::Simulate { .. } => {
            let outcome = runner::simulate(config, shutdown).await?;
            println!("{}", outcome.aggregator.stats);
            Ok(())
        }
        Command::Report { path } => {
            let stats = runner::report(path, config.meter.step_s)?;
            println!("{stats}");
            Ok(())
        }
    }
}
