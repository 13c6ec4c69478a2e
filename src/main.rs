// Entrypoint for the CLI application.
// - Keeps `main` small: initialise logging, parse arguments, dispatch.
// - Returns `anyhow::Result` so any command failure exits non-zero.

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so structured output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = doarama::cli::Cli::parse();
    doarama::cli::run(cli)
}
