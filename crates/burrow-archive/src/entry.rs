use std::io::{self, Read};
use std::path::{Path, PathBuf};

use burrow_fs::PosixMetadata;
use tar::{EntryType, Header};

/// PAX keyword for the modification time.
const PAX_MTIME: &str = "mtime";

/// One record of the archive: a file, directory or symlink with its metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root, `/`-separated.
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Body length; zero for directories and links.
    pub size: u64,
    pub metadata: PosixMetadata,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: PathBuf },
}

impl ArchiveEntry {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind, size: u64, metadata: PosixMetadata) -> Self {
        let size = if matches!(kind, EntryKind::File) { size } else { 0 };
        Self {
            path: path.into(),
            kind,
            size,
            metadata,
        }
    }

    /// Read an entry's record from a tar stream.
    ///
    /// Returns `None` for record kinds this codec does not materialize
    /// (hard links, devices, FIFOs, global PAX headers).
    ///
    /// A PAX `mtime` record attached to the entry overrides the header field.
    pub fn from_tar<R: Read>(entry: &mut tar::Entry<'_, R>) -> io::Result<Option<Self>> {
        let pax_mtime = pax_mtime(entry)?;
        let header = entry.header();
        let entry_type = header.entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            let target = entry.link_name()?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "symlink record without a target")
            })?;
            EntryKind::Symlink {
                target: target.into_owned(),
            }
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            return Ok(None);
        };

        let metadata = PosixMetadata {
            mode: header.mode()? & 0o7777,
            uid: header.uid()?,
            gid: header.gid()?,
            mtime: match pax_mtime {
                Some(mtime) => mtime,
                None => i64::try_from(header.mtime()?).unwrap_or(i64::MAX),
            },
        };

        Ok(Some(Self::new(entry.path()?.into_owned(), kind, entry.size(), metadata)))
    }

    /// Build the tar header for this entry. The path is set by the builder so
    /// that long names get their GNU extension records.
    ///
    /// The numeric mtime field is unsigned, so a time before 1970 is written
    /// as 0 here and carried exactly by [`pax_mtime_record`](Self::pax_mtime_record).
    pub fn header(&self) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(match self.kind {
            EntryKind::File => EntryType::Regular,
            EntryKind::Directory => EntryType::Directory,
            EntryKind::Symlink { .. } => EntryType::Symlink,
        });
        header.set_size(self.size);
        header.set_mode(self.metadata.mode);
        header.set_uid(self.metadata.uid);
        header.set_gid(self.metadata.gid);
        header.set_mtime(u64::try_from(self.metadata.mtime).unwrap_or(0));
        header
    }

    /// A PAX extended header to write ahead of this entry when its mtime
    /// is negative, as `(header, body)`.
    pub fn pax_mtime_record(&self) -> io::Result<Option<(Header, Vec<u8>)>> {
        if self.metadata.mtime >= 0 {
            return Ok(None);
        }
        let body = pax_record(PAX_MTIME, &self.metadata.mtime.to_string());
        let mut header = Header::new_ustar();
        header.set_path("@PaxHeader")?;
        header.set_entry_type(EntryType::XHeader);
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        Ok(Some((header, body)))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink { .. })
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

/// One `"<len> <key>=<value>\n"` record, where `len` counts the whole line.
fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let rest = key.len() + value.len() + 3;
    let mut len = rest + 1;
    while len != rest + len.to_string().len() {
        len = rest + len.to_string().len();
    }
    format!("{len} {key}={value}\n").into_bytes()
}

/// Whole seconds of a PAX `mtime` record, if the entry has one.
fn pax_mtime<R: Read>(entry: &mut tar::Entry<'_, R>) -> io::Result<Option<i64>> {
    let Some(extensions) = entry.pax_extensions()? else {
        return Ok(None);
    };
    for extension in extensions {
        let extension = extension?;
        if extension.key() != Ok(PAX_MTIME) {
            continue;
        }
        let invalid = |e: &dyn std::fmt::Display| {
            io::Error::new(io::ErrorKind::InvalidData, format!("bad PAX mtime: {e}"))
        };
        let value = extension.value().map_err(|e| invalid(&e))?;
        let secs = value.split('.').next().unwrap_or(value);
        return secs.parse().map(Some).map_err(|e| invalid(&e));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(mode: u32) -> PosixMetadata {
        PosixMetadata {
            mode,
            uid: 1000,
            gid: 1000,
            mtime: 1_600_000_000,
        }
    }

    #[test]
    fn entry_kinds() {
        let file = ArchiveEntry::new("bin/tool", EntryKind::File, 1024, meta(0o755));
        assert!(file.is_file());
        assert_eq!(file.size, 1024);

        let dir = ArchiveEntry::new("bin", EntryKind::Directory, 4096, meta(0o755));
        assert!(dir.is_directory());
        assert_eq!(dir.size, 0);

        let link = ArchiveEntry::new(
            "lib/lib.so",
            EntryKind::Symlink {
                target: PathBuf::from("liblib.so.1"),
            },
            0,
            meta(0o777),
        );
        assert!(link.is_symlink());
        assert_eq!(link.symlink_target(), Some(Path::new("liblib.so.1")));
    }

    #[test]
    fn header_carries_metadata() {
        let entry = ArchiveEntry::new("data/db", EntryKind::File, 42, meta(0o640));
        let header = entry.header();
        assert_eq!(header.entry_type(), EntryType::Regular);
        assert_eq!(header.size().unwrap(), 42);
        assert_eq!(header.mode().unwrap(), 0o640);
        assert_eq!(header.uid().unwrap(), 1000);
        assert_eq!(header.mtime().unwrap(), 1_600_000_000);
    }

    #[test]
    fn header_handles_big_numbers() {
        let mut metadata = meta(0o644);
        metadata.uid = 10_000_000_000;
        let entry = ArchiveEntry::new("big", EntryKind::File, 20_000_000_000, metadata);
        let header = entry.header();
        assert_eq!(header.size().unwrap(), 20_000_000_000);
        assert_eq!(header.uid().unwrap(), 10_000_000_000);
    }

    #[test]
    fn negative_mtime_clamps_to_epoch() {
        let mut metadata = meta(0o644);
        metadata.mtime = -5;
        let header = ArchiveEntry::new("old", EntryKind::File, 0, metadata).header();
        assert_eq!(header.mtime().unwrap(), 0);
    }

    #[test]
    fn pax_record_length_counts_itself() {
        assert_eq!(pax_record("mtime", "-5"), b"12 mtime=-5\n");
        assert_eq!(pax_record("mtime", "-1234567"), b"18 mtime=-1234567\n");
        assert_eq!(pax_record("k", "abcd"), b"9 k=abcd\n");
        assert_eq!(pax_record("k", "abcde"), b"11 k=abcde\n");
    }

    #[test]
    fn pax_record_only_for_times_before_epoch() {
        assert!(ArchiveEntry::new("new", EntryKind::File, 0, meta(0o644)).pax_mtime_record().unwrap().is_none());

        let mut metadata = meta(0o644);
        metadata.mtime = -86_400;
        let entry = ArchiveEntry::new("old", EntryKind::File, 0, metadata);
        let (header, body) = entry.pax_mtime_record().unwrap().unwrap();
        assert_eq!(header.entry_type(), EntryType::XHeader);
        assert_eq!(header.size().unwrap(), body.len() as u64);
        assert_eq!(body, b"16 mtime=-86400\n");
    }

    fn read_back(tar: Vec<u8>) -> ArchiveEntry {
        let mut archive = tar::Archive::new(tar.as_slice());
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        ArchiveEntry::from_tar(&mut entry).unwrap().unwrap()
    }

    #[test]
    fn negative_mtime_survives_through_pax() {
        let mut metadata = meta(0o644);
        metadata.mtime = -315_619_200;
        let entry = ArchiveEntry::new("1960.txt", EntryKind::File, 0, metadata);

        let mut builder = tar::Builder::new(Vec::new());
        let (pax, body) = entry.pax_mtime_record().unwrap().unwrap();
        builder.append(&pax, body.as_slice()).unwrap();
        builder.append_data(&mut entry.header(), &entry.path, io::empty()).unwrap();

        let read = read_back(builder.into_inner().unwrap());
        assert_eq!(read.path, Path::new("1960.txt"));
        assert_eq!(read.metadata.mtime, -315_619_200);
    }

    #[test]
    fn fractional_pax_mtime_keeps_whole_seconds() {
        let mut builder = tar::Builder::new(Vec::new());
        let body = pax_record(PAX_MTIME, "1700000000.75");
        let mut pax = Header::new_ustar();
        pax.set_path("@PaxHeader").unwrap();
        pax.set_entry_type(EntryType::XHeader);
        pax.set_size(body.len() as u64);
        pax.set_cksum();
        builder.append(&pax, body.as_slice()).unwrap();
        let entry = ArchiveEntry::new("precise", EntryKind::File, 0, meta(0o644));
        builder.append_data(&mut entry.header(), &entry.path, io::empty()).unwrap();

        assert_eq!(read_back(builder.into_inner().unwrap()).metadata.mtime, 1_700_000_000);
    }
}
