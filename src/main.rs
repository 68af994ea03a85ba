//! Entry point for the `soundalike` command-line tool.

use std::process::ExitCode;

use soundalike::cli::{self, CliError};
use soundalike::logging;

fn main() -> ExitCode {
    if let Err(err) = logging::init() {
        eprintln!("File logging disabled: {err}");
        if let Err(err) = logging::init_stderr_only() {
            eprintln!("Logging disabled: {err}");
        }
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run() -> Result<(), CliError> {
    let Some(options) = cli::parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::run(options, &mut out)
}
