//! Archive extraction: join chunks, decompress, check, materialize.
//!
//! Every record passes two containment checks before anything is written for
//! it: the syntactic one on the stored name, then a canonical one on each
//! existing ancestor as it really exists on disk, taken before the next
//! missing level is created. Directory metadata is restored last, so writing
//! children does not disturb parent timestamps or trip over read-only modes.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use burrow_fs::{PosixMetadata, SplitReader, apply_mode, apply_mtime, apply_owner, replace_symlink};

use crate::entry::{ArchiveEntry, EntryKind};
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::format::CompressionKind;
use crate::options::ExtractOptions;
use crate::remap::PathRemapRule;
use crate::report::{ExtractReport, MetadataField};
use crate::sanitize::{SanitizedPath, ensure_within, sanitize_entry_path, to_slash};

/// Extract the archive stored in `chunks`, in order, under `dest_root`.
///
/// A path traversal attempt aborts the whole extraction. Metadata that cannot
/// be restored is reported, not fatal.
pub fn extract<P: AsRef<Path>>(
    kind: CompressionKind,
    chunks: &[P],
    dest_root: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let dest_root = dest_root.as_ref();
    let filter = options.filters.compile()?;
    let Some(first_chunk) = chunks.first().map(|p| p.as_ref().to_path_buf()) else {
        return Err(Error::ExtractionFailed {
            path: dest_root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no archive chunks given"),
        });
    };

    fs::create_dir_all(dest_root).map_err(|e| Error::DirectoryCreationFailed {
        path: dest_root.to_path_buf(),
        source: e,
    })?;
    let real_dest = fs::canonicalize(dest_root).map_err(|e| Error::ExtractionFailed {
        path: dest_root.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        dest = %real_dest.display(),
        chunks = chunks.len(),
        compression = %kind,
        "extracting archive"
    );

    let stream_err = |e: io::Error| Error::ExtractionFailed {
        path: first_chunk.clone(),
        source: e,
    };

    let reader = kind.decoder(BufReader::new(SplitReader::new(chunks)))?;
    let mut archive = tar::Archive::new(reader);
    let mut extractor = Extractor::new(real_dest, filter, options.remap_rule());

    for entry in archive.entries().map_err(stream_err)? {
        let mut entry = entry.map_err(stream_err)?;
        extractor.unpack(&mut entry)?;
    }

    let report = extractor.finish();
    tracing::info!(dest = %dest_root.display(), "extracted {report}");
    Ok(report)
}

struct Extractor {
    real_dest: PathBuf,
    filter: Filter,
    remap: PathRemapRule,
    report: ExtractReport,
    /// Directories known to exist, relative to the destination.
    known_dirs: HashSet<PathBuf>,
    /// Directories this run created, in creation order.
    created_dirs: Vec<PathBuf>,
    /// Directory records whose metadata is applied once all children are in place.
    deferred: Vec<(PathBuf, PosixMetadata)>,
}

impl Extractor {
    fn new(real_dest: PathBuf, filter: Filter, remap: PathRemapRule) -> Self {
        Self {
            real_dest,
            filter,
            remap,
            report: ExtractReport::default(),
            known_dirs: HashSet::new(),
            created_dirs: Vec::new(),
            deferred: Vec::new(),
        }
    }

    fn unpack<R: Read>(&mut self, entry: &mut tar::Entry<'_, R>) -> Result<()> {
        let raw_path = entry
            .path()
            .map_err(|e| Error::ExtractionFailed {
                path: self.real_dest.clone(),
                source: e,
            })?
            .into_owned();

        let record = ArchiveEntry::from_tar(entry).map_err(|e| Error::ExtractionFailed {
            path: raw_path.clone(),
            source: e,
        })?;
        let Some(record) = record else {
            tracing::warn!(
                path = %raw_path.display(),
                kind = ?entry.header().entry_type(),
                "skipping unsupported record"
            );
            self.report.unsupported.push(raw_path);
            return Ok(());
        };

        let sanitized = sanitize_entry_path(&raw_path, &self.real_dest)?;
        if sanitized.is_root() {
            return Ok(());
        }

        match &record.kind {
            EntryKind::Directory => self.unpack_dir(&sanitized, &record),
            EntryKind::File => self.unpack_file(&sanitized, &record, entry),
            EntryKind::Symlink { target } => self.unpack_symlink(&sanitized, target),
        }
    }

    fn unpack_dir(&mut self, sanitized: &SanitizedPath, record: &ArchiveEntry) -> Result<()> {
        self.make_dirs(&sanitized.relative, &sanitized.original)?;
        ensure_within(&self.real_dest, &sanitized.resolved, &sanitized.original)?;
        tracing::debug!(path = %sanitized.relative.display(), "directory");
        self.deferred.push((sanitized.relative.clone(), record.metadata));
        Ok(())
    }

    fn unpack_file<R: Read>(
        &mut self,
        sanitized: &SanitizedPath,
        record: &ArchiveEntry,
        body: &mut tar::Entry<'_, R>,
    ) -> Result<()> {
        if !self.filter.selects(&sanitized.relative_str()) {
            tracing::debug!(path = %sanitized.relative.display(), "filtered out");
            self.report.filtered.push(sanitized.relative.clone());
            return Ok(());
        }

        self.prepare_parent(sanitized)?;
        let path = &sanitized.resolved;
        let to_err = |e: io::Error| Error::ExtractionFailed {
            path: path.clone(),
            source: e,
        };

        // Never write through a link planted by an earlier record.
        if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(path).map_err(to_err)?;
        }
        let mut file = File::create(path).map_err(to_err)?;
        ensure_within(&self.real_dest, path, &sanitized.original)?;

        let written = io::copy(body, &mut file).map_err(to_err)?;
        drop(file);
        tracing::debug!(path = %sanitized.relative.display(), bytes = written, "file");

        self.report.files += 1;
        self.report.bytes += written;
        self.restore_metadata(path, &record.metadata);
        Ok(())
    }

    fn unpack_symlink(&mut self, sanitized: &SanitizedPath, target: &Path) -> Result<()> {
        if !self.filter.selects(&sanitized.relative_str()) {
            tracing::debug!(path = %sanitized.relative.display(), "filtered out");
            self.report.filtered.push(sanitized.relative.clone());
            return Ok(());
        }

        self.prepare_parent(sanitized)?;
        let target = self.remap.remap_target(target);
        replace_symlink(&target, &sanitized.resolved).map_err(|e| Error::SymlinkCreationFailed {
            target: target.clone(),
            link: sanitized.resolved.clone(),
            source: e,
        })?;
        tracing::debug!(
            path = %sanitized.relative.display(),
            target = %target.display(),
            "symlink"
        );
        self.report.symlinks += 1;
        Ok(())
    }

    /// Create the parent of an entry and check where it really lives.
    fn prepare_parent(&mut self, sanitized: &SanitizedPath) -> Result<()> {
        let parent = sanitized.relative.parent().unwrap_or(Path::new(""));
        self.make_dirs(parent, &sanitized.original)?;
        ensure_within(&self.real_dest, &self.real_dest.join(parent), &sanitized.original)?;
        Ok(())
    }

    /// Create `relative` and its ancestors one level at a time, remembering
    /// which ones did not exist before.
    ///
    /// A level that already exists as anything other than a real directory
    /// (a planted link, say) must resolve inside the destination before the
    /// next level is created beneath it. Only real directories are cached,
    /// since a later record may replace a link but never a directory.
    fn make_dirs(&mut self, relative: &Path, entry: &Path) -> Result<()> {
        let mut current = PathBuf::new();
        for component in relative.components() {
            current.push(component);
            if self.known_dirs.contains(&current) {
                continue;
            }
            let path = self.real_dest.join(&current);
            match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    ensure_within(&self.real_dest, &path, entry)?;
                    continue;
                }
                Err(_) => match fs::create_dir(&path) {
                    Ok(()) => self.created_dirs.push(current.clone()),
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        ensure_within(&self.real_dest, &path, entry)?;
                    }
                    Err(e) => return Err(Error::DirectoryCreationFailed { path, source: e }),
                },
            }
            self.known_dirs.insert(current.clone());
        }
        Ok(())
    }

    /// Owner first, since changing it may clear setuid bits; mode last, since
    /// it may remove the access needed to set the timestamp.
    fn restore_metadata(&mut self, path: &Path, metadata: &PosixMetadata) {
        if let Err(e) = apply_owner(path, metadata.uid, metadata.gid) {
            self.report.record_metadata_failure(path.to_path_buf(), MetadataField::Owner, &e);
        }
        if let Err(e) = apply_mtime(path, metadata.mtime) {
            self.report.record_metadata_failure(path.to_path_buf(), MetadataField::Mtime, &e);
        }
        if let Err(e) = apply_mode(path, metadata.mode) {
            self.report.record_metadata_failure(path.to_path_buf(), MetadataField::Mode, &e);
        }
    }

    fn finish(mut self) -> ExtractReport {
        let pruned = if self.filter.is_active() {
            self.prune_unselected()
        } else {
            HashSet::new()
        };

        let deferred = std::mem::take(&mut self.deferred);
        for (relative, metadata) in deferred.iter().rev() {
            if pruned.contains(relative) {
                continue;
            }
            let path = self.real_dest.join(relative);
            self.restore_metadata(&path, metadata);
            self.report.directories += 1;
        }
        self.report
    }

    /// Remove directories created by this run that ended up empty and are
    /// not selected themselves. Deepest first, so emptied parents go too.
    fn prune_unselected(&mut self) -> HashSet<PathBuf> {
        let mut candidates = std::mem::take(&mut self.created_dirs);
        candidates.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

        let mut pruned = HashSet::new();
        for relative in candidates {
            if self.filter.selects_entry(&to_slash(&relative), true) {
                continue;
            }
            let path = self.real_dest.join(&relative);
            let empty = fs::read_dir(&path).is_ok_and(|mut it| it.next().is_none());
            if !empty {
                continue;
            }
            match fs::remove_dir(&path) {
                Ok(()) => {
                    tracing::debug!(path = %relative.display(), "pruned empty directory");
                    self.report.pruned.push(relative.clone());
                    pruned.insert(relative);
                }
                Err(e) => tracing::warn!(path = %path.display(), "could not prune directory: {e}"),
            }
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header(kind: tar::EntryType, size: u64, mode: u32) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(kind);
        header.set_size(size);
        header.set_mode(mode);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(1_600_000_000);
        header
    }

    /// Write a gzip archive through the public builder API and return its single chunk.
    fn gzip_archive(dir: &Path, build: impl FnOnce(&mut tar::Builder<Vec<u8>>)) -> PathBuf {
        let mut builder = tar::Builder::new(Vec::new());
        build(&mut builder);
        let tar = builder.into_inner().unwrap();

        let chunk = dir.join("archive.0");
        let mut encoder = CompressionKind::Gzip.encoder(File::create(&chunk).unwrap()).unwrap();
        io::Write::write_all(&mut encoder, &tar).unwrap();
        encoder.finish().unwrap();
        chunk
    }

    fn add_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, body: &[u8]) {
        let mut h = header(tar::EntryType::Regular, body.len() as u64, 0o644);
        builder.append_data(&mut h, path, body).unwrap();
    }

    fn add_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str) {
        let mut h = header(tar::EntryType::Directory, 0, 0o755);
        builder.append_data(&mut h, path, io::empty()).unwrap();
    }

    #[test]
    fn files_and_directories_are_materialized() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            add_dir(b, "docs");
            add_file(b, "docs/guide.md", b"# guide");
            add_file(b, "top.txt", b"top");
        });

        let report = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 1);
        assert_eq!(report.bytes, 10);
        assert_eq!(fs::read(dest.path().join("docs/guide.md")).unwrap(), b"# guide");
        assert_eq!(fs::read(dest.path().join("top.txt")).unwrap(), b"top");
    }

    #[test]
    fn missing_parents_are_created() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| add_file(b, "a/b/c.txt", b"c"));

        let report = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.directories, 0);
        assert!(dest.path().join("a/b/c.txt").is_file());
    }

    #[test]
    fn absolute_names_land_under_destination() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let mut tar = tar::Builder::new(Vec::new());
        let mut h = header(tar::EntryType::Regular, 2, 0o644);
        let name = b"/abs/file.txt";
        h.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        h.set_cksum();
        tar.append(&h, &b"ab"[..]).unwrap();
        let bytes = tar.into_inner().unwrap();
        let chunk = work.path().join("abs.0");
        let mut encoder = CompressionKind::Gzip.encoder(File::create(&chunk).unwrap()).unwrap();
        io::Write::write_all(&mut encoder, &bytes).unwrap();
        encoder.finish().unwrap();

        extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(fs::read(dest.path().join("abs/file.txt")).unwrap(), b"ab");
    }

    #[cfg(unix)]
    #[test]
    fn write_through_planted_symlink_is_rejected() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let outside_path = outside.path().to_path_buf();
        let chunk = gzip_archive(work.path(), |b| {
            let mut h = header(tar::EntryType::Symlink, 0, 0o777);
            b.append_link(&mut h, "escape", &outside_path).unwrap();
            add_file(b, "escape/victim.txt", b"pwned");
        });

        let err = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap_err();
        assert!(err.is_path_traversal(), "unexpected error: {err}");
        assert!(!outside.path().join("victim.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn nested_path_under_planted_link_creates_nothing_outside() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let outside_path = outside.path().to_path_buf();
        let chunk = gzip_archive(work.path(), |b| {
            let mut h = header(tar::EntryType::Symlink, 0, 0o777);
            b.append_link(&mut h, "escape", &outside_path).unwrap();
            add_file(b, "escape/planted/deeper/victim.txt", b"pwned");
        });

        let err = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap_err();
        assert!(err.is_path_traversal(), "unexpected error: {err}");
        assert!(!outside.path().join("planted").exists());
        assert_eq!(fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn directory_record_under_planted_link_creates_nothing_outside() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let outside_path = outside.path().to_path_buf();
        let chunk = gzip_archive(work.path(), |b| {
            add_dir(b, "inner");
            let mut h = header(tar::EntryType::Symlink, 0, 0o777);
            b.append_link(&mut h, "inner/escape", &outside_path).unwrap();
            add_dir(b, "inner/escape/a/b");
        });

        let err = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap_err();
        assert!(err.is_path_traversal(), "unexpected error: {err}");
        assert_eq!(fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn link_to_inside_directory_is_walked_through() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            add_dir(b, "real");
            let mut h = header(tar::EntryType::Symlink, 0, 0o777);
            b.append_link(&mut h, "alias", "real").unwrap();
            add_file(b, "alias/sub/file.txt", b"inside");
        });

        extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(fs::read(dest.path().join("real/sub/file.txt")).unwrap(), b"inside");
    }

    #[cfg(unix)]
    #[test]
    fn file_replaces_symlink_instead_of_following_it() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let target = outside.path().join("target.txt");
        fs::write(&target, b"original").unwrap();
        let target_for_archive = target.clone();
        let chunk = gzip_archive(work.path(), |b| {
            let mut h = header(tar::EntryType::Symlink, 0, 0o777);
            b.append_link(&mut h, "note", &target_for_archive).unwrap();
            add_file(b, "note", b"replaced");
        });

        extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"original");
        let note = dest.path().join("note");
        assert!(!fs::symlink_metadata(&note).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(note).unwrap(), b"replaced");
    }

    #[cfg(unix)]
    #[test]
    fn modes_and_times_are_restored() {
        use std::os::unix::fs::PermissionsExt;

        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            let mut h = header(tar::EntryType::Directory, 0, 0o750);
            b.append_data(&mut h, "bin", io::empty()).unwrap();
            let mut h = header(tar::EntryType::Regular, 4, 0o755);
            b.append_data(&mut h, "bin/tool", &b"tool"[..]).unwrap();
        });

        extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        let tool = fs::metadata(dest.path().join("bin/tool")).unwrap();
        assert_eq!(tool.permissions().mode() & 0o7777, 0o755);
        let dir = PosixMetadata::of(dest.path().join("bin")).unwrap();
        assert_eq!(dir.mode, 0o750);
        assert_eq!(dir.mtime, 1_600_000_000);
        assert_eq!(PosixMetadata::of(dest.path().join("bin/tool")).unwrap().mtime, 1_600_000_000);
    }

    #[test]
    fn unsupported_records_are_skipped() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            let mut h = header(tar::EntryType::Fifo, 0, 0o644);
            b.append_data(&mut h, "pipe", io::empty()).unwrap();
            add_file(b, "kept.txt", b"k");
        });

        let report = extract(CompressionKind::Gzip, &[chunk], dest.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(report.unsupported, vec![PathBuf::from("pipe")]);
        assert_eq!(report.files, 1);
        assert!(!dest.path().join("pipe").exists());
    }

    #[test]
    fn filtered_extraction_prunes_unselected_directories() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            add_dir(b, "docs");
            add_file(b, "docs/a.md", b"a");
            add_dir(b, "src");
            add_dir(b, "src/nested");
            add_file(b, "src/nested/lib.rs", b"fn");
        });

        let options = ExtractOptions::default().include(["^docs/"]);
        let report = extract(CompressionKind::Gzip, &[chunk], dest.path(), &options).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(report.directories, 1);
        assert_eq!(report.filtered, vec![PathBuf::from("src/nested/lib.rs")]);
        assert_eq!(report.pruned.len(), 2);
        assert!(dest.path().join("docs/a.md").is_file());
        assert!(!dest.path().join("src").exists());
    }

    #[test]
    fn preexisting_empty_directory_is_not_pruned() {
        let work = tempdir().unwrap();
        let dest = tempdir().unwrap();
        fs::create_dir(dest.path().join("keep")).unwrap();
        let chunk = gzip_archive(work.path(), |b| {
            add_dir(b, "keep");
            add_file(b, "wanted.txt", b"w");
        });

        let options = ExtractOptions::default().include(["wanted"]);
        let report = extract(CompressionKind::Gzip, &[chunk], dest.path(), &options).unwrap();
        assert!(report.pruned.is_empty());
        assert!(dest.path().join("keep").is_dir());
    }

    #[test]
    fn invalid_filter_touches_nothing() {
        let dest = tempdir().unwrap();
        let target = dest.path().join("never");
        let options = ExtractOptions::default().exclude(["(broken"]);

        let err = extract(CompressionKind::Gzip, &[dest.path().join("missing.0")], &target, &options).unwrap_err();
        assert!(err.is_configuration());
        assert!(!target.exists());
    }

    #[test]
    fn no_chunks_is_an_error() {
        let dest = tempdir().unwrap();
        let chunks: [PathBuf; 0] = [];
        let err = extract(CompressionKind::Zstd, &chunks, dest.path(), &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }
}
