//! POSIX mode, ownership and timestamp accessors.
//!
//! # Platform Behavior
//!
//! **Unix**: mode bits, uid/gid and mtime are read and written as-is.
//!
//! **Non-Unix**: mode is reduced to the read-only attribute, ownership is a
//! no-op, and uid/gid always read back as zero.

use std::fs::{File, Metadata};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Mode, owner and modification time of one filesystem entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PosixMetadata {
    /// Permission bits including setuid/setgid/sticky, masked to `0o7777`.
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Whole seconds since the Unix epoch.
    pub mtime: i64,
}

impl PosixMetadata {
    /// Read metadata without following a final symlink.
    pub fn of(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::symlink_metadata(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_metadata(&meta))
    }

    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            mode: meta.mode() & 0o7777,
            uid: u64::from(meta.uid()),
            gid: u64::from(meta.gid()),
            mtime: meta.mtime(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mut mode = if meta.permissions().readonly() { 0o444 } else { 0o644 };
        if meta.is_dir() {
            mode |= 0o111;
        }
        let mtime = meta.modified().map(to_epoch_secs).unwrap_or(0);
        Self {
            mode,
            uid: 0,
            gid: 0,
            mtime,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// Seconds since the epoch, negative for times before it.
pub fn to_epoch_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_secs())
            .map(|s| -s)
            .unwrap_or(i64::MIN),
    }
}

pub fn from_epoch_secs(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

/// Set permission bits on `path`, following symlinks.
pub fn apply_mode(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();

    #[cfg(unix)]
    let perms = {
        use std::os::unix::fs::PermissionsExt;
        std::fs::Permissions::from_mode(mode & 0o7777)
    };

    #[cfg(not(unix))]
    let perms = {
        let mut perms = std::fs::metadata(path)
            .map_err(|e| Error::Metadata {
                path: path.to_path_buf(),
                source: e,
            })?
            .permissions();
        perms.set_readonly(mode & 0o222 == 0);
        perms
    };

    std::fs::set_permissions(path, perms).map_err(|e| Error::Metadata {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Change owner and group of `path`.
///
/// Nothing is changed when the entry already carries the requested ids, so
/// unprivileged callers restoring their own files see no failure.
#[cfg(unix)]
pub fn apply_owner(path: impl AsRef<Path>, uid: u64, gid: u64) -> Result<()> {
    use nix::unistd::{Gid, Uid, chown};

    let path = path.as_ref();
    let current = PosixMetadata::of(path)?;
    if current.uid == uid && current.gid == gid {
        return Ok(());
    }

    let to_id = |id: u64| {
        u32::try_from(id).map_err(|_| Error::Metadata {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("id {id} does not fit the platform id type"),
            ),
        })
    };
    let owner = Uid::from_raw(to_id(uid)?);
    let group = Gid::from_raw(to_id(gid)?);

    chown(path, Some(owner), Some(group)).map_err(|errno| Error::Metadata {
        path: path.to_path_buf(),
        source: std::io::Error::from(errno),
    })
}

#[cfg(not(unix))]
pub fn apply_owner(_path: impl AsRef<Path>, _uid: u64, _gid: u64) -> Result<()> {
    Ok(())
}

/// Set the modification time of `path`, following symlinks.
pub fn apply_mtime(path: impl AsRef<Path>, secs: i64) -> Result<()> {
    let path = path.as_ref();
    let to_err = |e| Error::Metadata {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::open(path).map_err(to_err)?;
    file.set_modified(from_epoch_secs(secs)).map_err(to_err)
}
