//! Susurrador: experiment harnesses for the Susurro contention channel
//!
//! ## Usage
//!
//! ```bash
//! susurrador receive --mode read --iterations 64      # Sample own bandwidth
//! susurrador transmit --mode write --message "hi"     # Modulate bus pressure
//! susurrador timing --primitive sleep-for             # Benchmark a primitive
//! ```

use clap::Parser;
use std::process::ExitCode;
use susurrador::{Cli, CliResult, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Receive(args) => susurrador::receiver::run(&args),
        Commands::Transmit(args) => susurrador::transmitter::run(&args),
        Commands::Timing(args) => susurrador::timing::run(&args),
    }
}

/// Map `-q`/`-v` to a subscriber filter; `RUST_LOG` wins when set.
///
/// Diagnostics go to stderr so the stdout sample streams stay parseable.
fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
