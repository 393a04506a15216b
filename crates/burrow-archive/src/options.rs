use std::path::PathBuf;

use crate::filter::FilterSpec;
use crate::remap::PathRemapRule;

/// Chunk size used when none is given: 1 GiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub filters: FilterSpec,
    pub chunk_size: Option<u64>,
    pub follow_links: bool,
}

impl CreateOptions {
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn effective_chunk_size(&self) -> u64 {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub filters: FilterSpec,
    /// Current install directory that replaces stale targets under the volatile root.
    pub real_path: Option<PathBuf>,
}

impl ExtractOptions {
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn real_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.real_path = Some(path.into());
        self
    }

    pub fn remap_rule(&self) -> PathRemapRule {
        PathRemapRule::new(self.real_path.clone())
    }
}
