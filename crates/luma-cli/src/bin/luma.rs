use anyhow::Result;
use clap::Parser;
use std::io::Write;

use luma_cli::args::{CliArgs, Command};
use luma_cli::{driver, tracing_config};

fn main() -> Result<()> {
    // Zero cost unless LUMA_LOG or RUST_LOG is set.
    tracing_config::init_tracing();

    let args = CliArgs::parse();
    let status = match &args.command {
        Command::Lower(lower) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let status = driver::run(lower, &mut out)?;
            out.flush()?;
            status
        }
    };
    std::process::exit(status.code());
}
