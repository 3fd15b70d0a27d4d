use clap::Parser;
use stockledger::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
