use std::process::ExitCode;

use fleet_dispatch::cli;

fn main() -> ExitCode {
    cli::exit(cli::deploy())
}
