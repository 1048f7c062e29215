use std::process::ExitCode;

use clap::Parser;
use pixelsides::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    logger::init();
    logger::set_echo(args.verbose);
    cli::run(args)
}
