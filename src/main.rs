use clap::Parser;
use sharebook::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
