use std::path::PathBuf;

use anyhow::{Context, Result};
use burrow_archive::{CompressionKind, CreateOptions};
use clap::Args;

use crate::config::{Config, patterns};

#[derive(Args, Clone, Debug)]
pub struct CreateArg {
    /// File or directory to archive
    pub source: PathBuf,
    /// Directory receiving the chunk files
    pub dest_dir: PathBuf,
    /// Chunk file name prefix; chunks are named <PREFIX>.0, <PREFIX>.1, ...
    pub prefix: String,
    #[arg(short, long, value_name = "TAG", help = "Compression: z (gzip), j (bzip2), s (zstd) [default: z]")]
    pub compression: Option<CompressionKind>,
    #[arg(long, value_name = "BYTES", help = "Maximum size of one chunk [default: 1 GiB]")]
    pub chunk_size: Option<u64>,
    #[arg(long = "include", value_name = "REGEX", help = "Only archive paths matching one of these")]
    pub include: Vec<String>,
    #[arg(long = "exclude", value_name = "REGEX", help = "Skip paths matching any of these")]
    pub exclude: Vec<String>,
    #[arg(long, help = "Archive what symlinks point at instead of the links")]
    pub follow_links: bool,
}

pub fn create(arg: CreateArg, config: &Config) -> Result<()> {
    let kind = match arg.compression {
        Some(kind) => kind,
        None => config.compression()?.unwrap_or(CompressionKind::Gzip),
    };

    let mut options = CreateOptions::default()
        .include(patterns(&arg.include, &config.include))
        .exclude(patterns(&arg.exclude, &config.exclude))
        .follow_links(arg.follow_links || config.follow_links.unwrap_or(false));
    if let Some(bytes) = arg.chunk_size.or(config.chunk_size) {
        options = options.chunk_size(bytes);
    }

    let chunks = burrow_archive::create(kind, &arg.source, &arg.dest_dir, &arg.prefix, &options)
        .with_context(|| format!("Failed to archive '{}'", arg.source.display()))?;

    for chunk in chunks {
        println!("{}", chunk.display());
    }
    Ok(())
}
