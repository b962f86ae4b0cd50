use std::process::ExitCode;

fn main() -> ExitCode {
    nestplan_cli::run()
}
