// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PreFlight Pro command line.
//
// Entry point. Initialises logging to stderr, parses arguments, and runs the
// requested command on a blocking worker, optionally under a timeout.

mod analyze_cmd;
mod cli;
mod fix_cmd;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// Exit status when `--timeout-secs` elapses, as coreutils `timeout` uses.
const TIMED_OUT: i32 = 124;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let limit = cli.timeout_secs.map(Duration::from_secs);
    let work = tokio::task::spawn_blocking(move || match &cli.command {
        Commands::Analyze(args) => analyze_cmd::run(args),
        Commands::Fix(args) => fix_cmd::run(args),
    });

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(joined) => joined,
            Err(_) => {
                error!(seconds = limit.as_secs(), "Timed out");
                // The blocking worker cannot be cancelled; leave without waiting for it.
                std::process::exit(TIMED_OUT);
            }
        },
        None => work.await,
    };
    joined.context("worker task failed")?
}
