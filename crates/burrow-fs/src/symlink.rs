use std::path::Path;

use crate::{Error, Result};

/// Create a symlink at `link` pointing at the literal `target`.
///
/// Any non-directory entry already at `link` is removed first. The target is
/// neither resolved nor required to exist.
pub fn replace_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();

    match std::fs::symlink_metadata(link) {
        Ok(meta) if !meta.is_dir() => {
            std::fs::remove_file(link).map_err(|e| Error::Write {
                path: link.to_path_buf(),
                source: e,
            })?;
        }
        _ => {}
    }

    create(target, link)
}

#[cfg(unix)]
fn create(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::Write {
        path: link.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn create(_target: &Path, _link: &Path) -> Result<()> {
    Err(Error::SymlinkNotSupported)
}
