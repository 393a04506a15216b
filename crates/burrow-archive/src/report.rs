use std::fmt;
use std::path::PathBuf;

/// Which part of an entry's metadata could not be restored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataField {
    Owner,
    Mode,
    Mtime,
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Owner => "owner",
            Self::Mode => "mode",
            Self::Mtime => "mtime",
        })
    }
}

/// A non-fatal metadata restoration failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataFailure {
    pub path: PathBuf,
    pub field: MetadataField,
    pub message: String,
}

impl fmt::Display for MetadataFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not restore {} of '{}': {}", self.field, self.path.display(), self.message)
    }
}

/// Outcome of a successful extraction.
///
/// Only non-fatal findings end up here; anything fatal aborts the call instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    /// Body bytes written to regular files.
    pub bytes: u64,
    /// Relative paths rejected by the filter.
    pub filtered: Vec<PathBuf>,
    /// Records of kinds that are not materialized (hard links, devices, ...).
    pub unsupported: Vec<PathBuf>,
    /// Empty, unselected directories removed after extraction.
    pub pruned: Vec<PathBuf>,
    pub metadata_failures: Vec<MetadataFailure>,
}

impl ExtractReport {
    pub fn entry_count(&self) -> usize {
        self.files + self.directories + self.symlinks
    }

    /// No metadata restoration failed.
    pub fn is_clean(&self) -> bool {
        self.metadata_failures.is_empty()
    }

    pub(crate) fn record_metadata_failure(&mut self, path: PathBuf, field: MetadataField, err: &dyn fmt::Display) {
        tracing::warn!(path = %path.display(), %field, "metadata not restored: {err}");
        self.metadata_failures.push(MetadataFailure {
            path,
            field,
            message: err.to_string(),
        });
    }
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files ({} bytes), {} directories, {} symlinks",
            self.files, self.bytes, self.directories, self.symlinks
        )?;
        if !self.filtered.is_empty() {
            write!(f, ", {} filtered", self.filtered.len())?;
        }
        if !self.unsupported.is_empty() {
            write!(f, ", {} unsupported", self.unsupported.len())?;
        }
        if !self.metadata_failures.is_empty() {
            write!(f, ", {} metadata warnings", self.metadata_failures.len())?;
        }
        Ok(())
    }
}
