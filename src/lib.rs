use std::env;
use crate::cli::{Args, Command};
use crate::cli::run_scan;
use crate::gui::application::run_application;
use crate::error::AppRunError;

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod gui;
pub mod services;

pub fn init_logging(level: log::LevelFilter) {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Warn)
        .level_for("cardiac_zone", level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    match args.command {
        None => run_application(args.config)?,
        Some(Command::Scan) => run_scan(args.config)?,
    }
    Ok(())
}
