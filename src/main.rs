use std::process::ExitCode;

use clap::Parser;

use rasterpad::cli;
use rasterpad::logger;

fn main() -> ExitCode {
    logger::init();
    cli::run(cli::CliArgs::parse())
}
