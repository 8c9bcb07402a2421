use std::process::ExitCode;

fn main() -> ExitCode {
    festa_cli::run()
}
