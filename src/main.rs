use clap::Parser;
use watchtrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
