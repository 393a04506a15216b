use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burrow_archive::CompressionKind;
use serde::Deserialize;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "BURROW_CONFIG";

/// Defaults read from a TOML file. Every key is optional; flags win.
///
/// ```toml
/// compression = "s"
/// chunk-size = 1073741824
/// follow-links = false
/// include = ['^shared_prefs/']
/// exclude = ['^cache/', '\.tmp$']
/// real-path = "/data/app/~~Qx2==/com.example-Zy9=="
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub compression: Option<String>,
    pub chunk_size: Option<u64>,
    pub follow_links: Option<bool>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub real_path: Option<PathBuf>,
}

impl Config {
    /// Read `path`, or return the empty config when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("Invalid config '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The configured compression, validated against the known tags.
    pub fn compression(&self) -> Result<Option<CompressionKind>> {
        self.compression
            .as_deref()
            .map(|tag| tag.parse::<CompressionKind>())
            .transpose()
            .context("Invalid `compression` in config")
    }
}

/// Flag values replace config values; pattern lists replace as a whole.
pub fn patterns(flags: &[String], config: &[String]) -> Vec<String> {
    if flags.is_empty() { config.to_vec() } else { flags.to_vec() }
}
