use std::process::ExitCode;

fn main() -> ExitCode {
    reliefpath_cli::run()
}
