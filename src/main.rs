use std::process::ExitCode;

use clap::Parser;
use fftblur::cli::{self, CliArgs};
use fftblur::logger;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
