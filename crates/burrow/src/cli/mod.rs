use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::CONFIG_ENV;

pub mod create;
pub mod extract;

#[derive(Clone, Debug, Parser)]
#[command(name = "burrow", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// TOML file with default options
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "c", name = "create", about = "Archive a file or directory into split chunks")]
    Create(create::CreateArg),
    #[command(alias = "x", name = "extract", about = "Restore an archive from its chunks")]
    Extract(extract::ExtractArg),
}
