use std::io;
use std::path::{Path, PathBuf};

use burrow_fs::PosixMetadata;
use walkdir::WalkDir;

use crate::entry::{ArchiveEntry, EntryKind};
use crate::error::{Error, Result};

/// A filesystem entry found by [`TreeWalker`], ready to be archived.
#[derive(Clone, Debug)]
pub struct WalkEntry {
    /// Where the entry lives on disk.
    pub source: PathBuf,
    /// Distance from the walk root; the root itself is depth 0.
    pub depth: usize,
    pub entry: ArchiveEntry,
}

/// Lazy depth-first walk over a source tree.
///
/// Paths are reported relative to the base: the source itself when it is a
/// directory, otherwise its parent. The base is never reported. Siblings come
/// in file-name order. Sockets, FIFOs and devices are skipped.
pub struct TreeWalker {
    base: PathBuf,
    follow_links: bool,
    inner: walkdir::IntoIter,
}

impl TreeWalker {
    pub fn new(source: impl AsRef<Path>, follow_links: bool) -> Result<Self> {
        let source = source.as_ref();
        let meta = if follow_links {
            std::fs::metadata(source)
        } else {
            std::fs::symlink_metadata(source)
        }
        .map_err(|e| Error::ArchivingFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let base = if meta.is_dir() {
            source.to_path_buf()
        } else {
            source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/"))
        };

        let inner = WalkDir::new(source)
            .follow_links(follow_links)
            .follow_root_links(follow_links)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            base,
            follow_links,
            inner,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn describe(&self, dent: &walkdir::DirEntry) -> Result<Option<WalkEntry>> {
        let path = dent.path();
        let relative = match path.strip_prefix(&self.base) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
            _ => return Ok(None),
        };
        let to_err = |e: io::Error| Error::ArchivingFailed {
            path: path.to_path_buf(),
            source: e,
        };

        let file_type = dent.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink {
                target: std::fs::read_link(path).map_err(to_err)?,
            }
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            tracing::debug!(path = %path.display(), "skipping special file");
            return Ok(None);
        };

        let meta = dent.metadata().map_err(|e| to_err(e.into()))?;
        let entry = ArchiveEntry::new(relative, kind, meta.len(), PosixMetadata::from_metadata(&meta));

        Ok(Some(WalkEntry {
            source: path.to_path_buf(),
            depth: dent.depth(),
            entry,
        }))
    }

    /// Broken links are skipped when following, the way they would be if
    /// they were neither files nor directories.
    fn is_broken_link(&self, err: &walkdir::Error) -> bool {
        if !self.follow_links || err.loop_ancestor().is_some() {
            return false;
        }
        let not_found = err
            .io_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
        not_found
            && err
                .path()
                .and_then(|p| std::fs::symlink_metadata(p).ok())
                .is_some_and(|m| m.file_type().is_symlink())
    }
}

impl Iterator for TreeWalker {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dent = match self.inner.next()? {
                Ok(dent) => dent,
                Err(err) if self.is_broken_link(&err) => {
                    tracing::debug!(path = ?err.path(), "skipping broken symlink");
                    continue;
                }
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.base.clone());
                    return Some(Err(Error::ArchivingFailed {
                        path,
                        source: err.into(),
                    }));
                }
            };

            match self.describe(&dent) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
