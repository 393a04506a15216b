use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid compression type: '{0}'")]
    UnsupportedCompression(char),

    #[error("invalid filter pattern '{pattern}': {message}")]
    InvalidFilter { pattern: String, message: String },

    #[error("path traversal detected: entry '{entry}' resolves to '{resolved}'")]
    PathTraversal { entry: PathBuf, resolved: PathBuf },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to archive '{path}': {source}")]
    ArchivingFailed { path: PathBuf, source: io::Error },

    #[error("failed to create symlink '{link}' -> '{target}': {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: burrow_fs::Error,
    },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] burrow_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Raised before any stream is opened: bad compression tag, bad pattern, zero chunk size.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCompression(_)
                | Self::InvalidFilter { .. }
                | Self::Fs(burrow_fs::Error::ZeroChunkSize)
        )
    }

    pub fn is_path_traversal(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
