use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use layerfe::cli::{self, CliArgs};
use layerfe::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let settings = args.load_settings();

    // Initialize session log (overwrites previous session log)
    let level = if args.verbose {
        LevelFilter::Debug.max(settings.log_level)
    } else {
        settings.log_level
    };
    logger::init(level);

    cli::run(args, settings)
}
