use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{App, Commands};
use crate::config::Config;

mod cli;
mod config;

fn main() -> Result<()> {
    let app = App::parse();
    init_tracing(app.verbose);

    let config = Config::load(app.config.as_deref())?;
    match app.cmd {
        Commands::Create(arg) => cli::create::create(arg, &config),
        Commands::Extract(arg) => cli::extract::extract(arg, &config),
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
