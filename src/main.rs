use clap::Parser;
use todo_flow::cli::commands::{Cli, Commands};
use todo_flow::cli::handlers;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    // Tracing is opt-in via RUST_LOG and always goes to stderr, so --json
    // output on stdout stays machine-readable.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Init => handlers::cmd_init(&cli),
        _ => handlers::dispatch(&cli),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
