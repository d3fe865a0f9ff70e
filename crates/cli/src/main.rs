use std::process::ExitCode;

fn main() -> ExitCode {
    routey_cli::run()
}
