use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to update metadata of '{path}': {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("symlink not supported on this platform")]
    SymlinkNotSupported,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The path the failing operation was acting on, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } | Self::Metadata { path, .. } => {
                Some(path)
            }
            Self::ZeroChunkSize | Self::SymlinkNotSupported => None,
        }
    }
}

/// Wrap into an `io::Error` so the split streams can surface failures through `Read`/`Write`.
impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Read { source, .. } | Error::Write { source, .. } | Error::Metadata { source, .. } => {
                source.kind()
            }
            Error::ZeroChunkSize => std::io::ErrorKind::InvalidInput,
            Error::SymlinkNotSupported => std::io::ErrorKind::Unsupported,
        };
        std::io::Error::new(kind, err)
    }
}
