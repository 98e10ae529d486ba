//! Stackpatch CLI entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use stackpatch::StackpatchError;
use stackpatch_cli::{Args, error_adapter::to_reportables};

fn main() {
    // Install miette's pretty panic hook early for better panic reports
    miette::set_panic_hook();

    let args = Args::parse();

    let requested = args.effective_log_level();
    let log_level = LevelFilter::from_str(requested).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {requested}. Using 'warn' instead.");
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting Stackpatch");
    debug!(args:?; "Parsed arguments");

    if let Err(err) = stackpatch_cli::run(&args) {
        if let StackpatchError::Parse { path, .. } = &err {
            error!(path:% = path.display(); "Failed to load template");
        }

        let reporter = miette::GraphicalReportHandler::new();

        // Render each diagnostic independently
        for reportable in to_reportables(&err) {
            let mut writer = String::new();
            reporter
                .render_report(&mut writer, &reportable)
                .expect("Writing to String buffer is infallible");

            error!("{writer}");
        }

        process::exit(1);
    }

    info!("Completed successfully");
}
