use std::process::ExitCode;

fn main() -> ExitCode {
    bulkship_cli::run()
}
