//! Binary entrypoint for the `vouch` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match vouch::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
