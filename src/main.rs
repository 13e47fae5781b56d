// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, hand off to `cli::run`.
// - Any error ends the process with status 1 after printing the error chain.

use gitdata_sync::cli;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let matches = cli::app().get_matches();

    // RUST_LOG wins; otherwise warnings only, or everything with -v.
    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli::run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
