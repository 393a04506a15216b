//! Zip-slip prevention in two phases.
//!
//! 1. [`sanitize_entry_path`] normalizes the stored member name without
//!    touching the filesystem and rejects anything that climbs above the root.
//! 2. [`ensure_within`] canonicalizes a path that now exists on disk and checks
//!    it is still under the real destination root. This catches escapes that
//!    only appear through symlinked ancestors planted by earlier records.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: PathBuf,
    /// Normalized path relative to the destination root; empty for the root itself.
    pub relative: PathBuf,
    pub resolved: PathBuf,
}

impl SanitizedPath {
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// The relative path with `/` separators, as filters see it.
    pub fn relative_str(&self) -> String {
        to_slash(&self.relative)
    }
}

/// Normalize a stored member name and resolve it under `base`.
///
/// A leading `/` is dropped, `.` segments vanish and `..` pops the previous
/// segment. A `..` with nothing left to pop is a traversal attempt.
pub fn sanitize_entry_path(entry_path: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<SanitizedPath> {
    let entry_path = entry_path.as_ref();
    let base = base.as_ref();

    let relative = match normalize_path(entry_path) {
        Some(normalized) if !escapes(&normalized) => normalized,
        Some(normalized) => {
            return Err(Error::PathTraversal {
                entry: entry_path.to_path_buf(),
                resolved: base.join(normalized),
            });
        }
        None => {
            return Err(Error::PathTraversal {
                entry: entry_path.to_path_buf(),
                resolved: entry_path.to_path_buf(),
            });
        }
    };

    Ok(SanitizedPath {
        original: entry_path.to_path_buf(),
        resolved: base.join(&relative),
        relative,
    })
}

/// Canonicalize `path` and require it to sit under `real_base`.
///
/// `real_base` must itself be canonical. Returns the canonical path.
pub fn ensure_within(real_base: &Path, path: &Path, entry_path: &Path) -> Result<PathBuf> {
    let real = std::fs::canonicalize(path).map_err(|e| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !real.starts_with(real_base) {
        return Err(Error::PathTraversal {
            entry: entry_path.to_path_buf(),
            resolved: real,
        });
    }
    Ok(real)
}

/// Syntactic normalization. Unresolvable `..` segments are kept at the front.
/// Returns `None` for paths carrying a platform prefix (`C:`), which have no
/// meaning inside a tar stream.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) => return None,
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                _ => parts.push(Component::ParentDir),
            },
            Component::Normal(part) => parts.push(Component::Normal(part)),
        }
    }

    Some(parts.iter().collect())
}

fn escapes(normalized: &Path) -> bool {
    matches!(normalized.components().next(), Some(Component::ParentDir))
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}
