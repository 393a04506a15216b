use std::path::PathBuf;

use anyhow::{Context, Result};
use burrow_archive::{CompressionKind, ExtractOptions};
use clap::Args;

use crate::config::{Config, patterns};

#[derive(Args, Clone, Debug)]
pub struct ExtractArg {
    /// Directory to restore into; created if missing
    pub dest_root: PathBuf,
    /// Chunk files in order
    #[arg(required = true)]
    pub chunks: Vec<PathBuf>,
    #[arg(short, long, value_name = "TAG", help = "Compression: z (gzip), j (bzip2), s (zstd) [default: z]")]
    pub compression: Option<CompressionKind>,
    #[arg(long = "include", value_name = "REGEX", help = "Only restore paths matching one of these")]
    pub include: Vec<String>,
    #[arg(long = "exclude", value_name = "REGEX", help = "Skip paths matching any of these")]
    pub exclude: Vec<String>,
    #[arg(long, value_name = "PATH", help = "Current install directory for links into /data/app")]
    pub real_path: Option<PathBuf>,
}

pub fn extract(arg: ExtractArg, config: &Config) -> Result<()> {
    let kind = match arg.compression {
        Some(kind) => kind,
        None => config.compression()?.unwrap_or(CompressionKind::Gzip),
    };

    let mut options = ExtractOptions::default()
        .include(patterns(&arg.include, &config.include))
        .exclude(patterns(&arg.exclude, &config.exclude));
    if let Some(path) = arg.real_path.or_else(|| config.real_path.clone()) {
        options = options.real_path(path);
    }

    let report = burrow_archive::extract(kind, &arg.chunks, &arg.dest_root, &options)
        .with_context(|| format!("Failed to extract into '{}'", arg.dest_root.display()))?;

    println!("{report}");
    for failure in &report.metadata_failures {
        eprintln!("warning: {failure}");
    }
    Ok(())
}
