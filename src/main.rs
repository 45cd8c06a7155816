use clap::Parser;
use cusumbars::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
