use clap::Parser;
use log::{info, LevelFilter};
use msgbox::IconType;
use cardiac_zone::{init_logging, run};
use cardiac_zone::cli::Args;
use cardiac_zone::error::{error_msgbox, AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    init_logging(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info });
    info!(concat!("Cardiac Zone ", env!("CARGO_PKG_VERSION")));

    let headless = args.command.is_some();

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            msgbox::create(
                concat!("Cardiac Zone ", env!("CARGO_PKG_VERSION")),
                "This application has already been started",
                IconType::Error,
            ).expect("Could not create msgbox");
            Ok(())
        },
        Err(err) if headless => Err(err),
        Err(err) => {
            error_msgbox("Unexpected error", &err);
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
