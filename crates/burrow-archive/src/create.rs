//! Archive creation: walk, filter, serialize, compress, split.
//!
//! The stream is layered as `tar::Builder` -> [`Encoder`] -> `BufWriter` ->
//! [`SplitWriter`], and finished in that order so every buffered byte reaches
//! the chunk files before they are synced.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use burrow_fs::SplitWriter;

use crate::entry::EntryKind;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::format::CompressionKind;
use crate::options::CreateOptions;
use crate::sanitize::to_slash;
use crate::walk::{TreeWalker, WalkEntry};

/// Archive `source` into `dest_dir/<prefix>.0`, `dest_dir/<prefix>.1`, ...
///
/// Returns the chunk files written, in order. On failure, chunks already
/// written are left in place.
pub fn create(
    kind: CompressionKind,
    source: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
    prefix: &str,
    options: &CreateOptions,
) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    let dest_dir = dest_dir.as_ref();

    let filter = options.filters.compile()?;
    let sink = SplitWriter::new(dest_dir, prefix, options.effective_chunk_size())?;
    let walker = TreeWalker::new(source, options.follow_links)?;
    std::fs::create_dir_all(dest_dir).map_err(|e| Error::DirectoryCreationFailed {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(
        source = %source.display(),
        base = %walker.base().display(),
        compression = %kind,
        "creating archive"
    );

    let encoder = kind.encoder(BufWriter::new(sink))?;
    let mut writer = ArchiveWriter::new(encoder, filter);
    for item in walker {
        writer.push(item?)?;
    }
    let (encoder, written) = writer.finish()?;

    let buffered = encoder.finish()?;
    let sink = buffered.into_inner().map_err(io::IntoInnerError::into_error)?;
    let files = sink.finish()?;

    tracing::info!(
        source = %source.display(),
        entries = written,
        chunks = files.len(),
        "archive created"
    );
    Ok(files)
}

struct PendingDir {
    walk: WalkEntry,
    emitted: bool,
}

/// Serializes walk entries as tar records.
///
/// Directories are held back on a stack of open ancestors and written only
/// once a selected descendant needs them, or when they close and are
/// themselves selected. Parents are always written before their children.
struct ArchiveWriter<W: Write> {
    builder: tar::Builder<W>,
    filter: Filter,
    open_dirs: Vec<PendingDir>,
    written: usize,
}

impl<W: Write> ArchiveWriter<W> {
    fn new(inner: W, filter: Filter) -> Self {
        Self {
            builder: tar::Builder::new(inner),
            filter,
            open_dirs: Vec::new(),
            written: 0,
        }
    }

    fn push(&mut self, item: WalkEntry) -> Result<()> {
        self.close_dirs(item.depth)?;

        if item.entry.is_directory() {
            self.open_dirs.push(PendingDir {
                walk: item,
                emitted: false,
            });
            return Ok(());
        }

        if !self.filter.selects(&to_slash(&item.entry.path)) {
            tracing::debug!(path = %item.entry.path.display(), "filtered out");
            return Ok(());
        }

        self.emit_open_dirs()?;
        append(&mut self.builder, &item)?;
        self.written += 1;
        Ok(())
    }

    /// Close every open directory at `depth` or deeper.
    fn close_dirs(&mut self, depth: usize) -> Result<()> {
        while let Some(top) = self.open_dirs.last() {
            if top.walk.depth < depth {
                break;
            }
            let wanted = !top.emitted && self.filter.selects_entry(&to_slash(&top.walk.entry.path), true);
            if wanted {
                self.emit_open_dirs()?;
            }
            self.open_dirs.pop();
        }
        Ok(())
    }

    fn emit_open_dirs(&mut self) -> Result<()> {
        for dir in self.open_dirs.iter_mut().filter(|d| !d.emitted) {
            append(&mut self.builder, &dir.walk)?;
            dir.emitted = true;
            self.written += 1;
        }
        Ok(())
    }

    /// Flush held directories and write the tar trailer.
    fn finish(mut self) -> Result<(W, usize)> {
        self.close_dirs(0)?;
        let written = self.written;
        Ok((self.builder.into_inner()?, written))
    }
}

fn append<W: Write>(builder: &mut tar::Builder<W>, walk: &WalkEntry) -> Result<()> {
    let entry = &walk.entry;
    let mut header = entry.header();
    let to_err = |e: io::Error| Error::ArchivingFailed {
        path: walk.source.clone(),
        source: e,
    };

    tracing::debug!(path = %entry.path.display(), "adding");
    if let Some((pax, body)) = entry.pax_mtime_record().map_err(to_err)? {
        builder.append(&pax, body.as_slice()).map_err(to_err)?;
    }
    match &entry.kind {
        EntryKind::Symlink { target } => builder
            .append_link(&mut header, &entry.path, target)
            .map_err(to_err),
        EntryKind::Directory => builder
            .append_data(&mut header, &entry.path, io::empty())
            .map_err(to_err),
        EntryKind::File => {
            let file = File::open(&walk.source).map_err(to_err)?;
            // The size may have moved since the walk; the header must match the body exactly.
            let len = file.metadata().map_err(to_err)?.len();
            header.set_size(len);
            let mut body = file.take(len);
            builder
                .append_data(&mut header, &entry.path, &mut body)
                .map_err(to_err)?;
            if body.limit() > 0 {
                return Err(to_err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shrank while being archived",
                )));
            }
            Ok(())
        }
    }
}
