use clap::Parser;
use momotrader::cli::{Cli, run};
use momotrader::telemetry::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("warning: {e}");
    }
    run(cli)
}
