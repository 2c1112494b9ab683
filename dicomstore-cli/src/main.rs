// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use crate::cli::Cli;
use crate::error::{CliError, Result};

mod cli;
mod commands;
mod config;
mod error;

fn inner_main() -> Result<()> {
    let cli = Cli::try_parse()?;
    let config = config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();
    debug!("Using database {} table {}", config.database, config.table);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run_default(&config, cli.command, &mut out)?;
    out.flush()
        .map_err(|e| CliError::io("Failed to flush output", e))
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(()) => ExitCode::SUCCESS,
        // help and version requests exit 0, argument errors 2
        Err(CliError::Usage(e)) => {
            let _ = e.print();
            u8::try_from(e.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
        }
        Err(e) => {
            eprintln!("dicomstore: {e}");
            ExitCode::FAILURE
        }
    }
}
