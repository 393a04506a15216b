//! One logical byte stream spread across numbered chunk files.
//!
//! Chunks are named `<prefix>.<index>` with a zero-based, gapless index. Chunk
//! boundaries carry no framing; concatenating the chunks in order yields the
//! original stream byte for byte.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// File name of the chunk at `index`.
pub fn chunk_name(prefix: &str, index: usize) -> String {
    format!("{prefix}.{index}")
}

/// `Write` sink that rolls over to a new chunk file every `limit` bytes.
///
/// Chunk files are opened lazily, so the last chunk always holds at least one
/// byte unless the whole stream was empty.
#[derive(Debug)]
pub struct SplitWriter {
    dir: PathBuf,
    prefix: String,
    limit: u64,
    current: Option<File>,
    written: u64,
    files: Vec<PathBuf>,
}

impl SplitWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, limit: u64) -> Result<Self> {
        if limit == 0 {
            return Err(Error::ZeroChunkSize);
        }
        Ok(Self {
            dir: dir.into(),
            prefix: prefix.into(),
            limit,
            current: None,
            written: 0,
            files: Vec::new(),
        })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Chunks opened so far, in order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Sync the open chunk and return every chunk written.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if self.files.is_empty() {
            self.open_next()?;
        }
        self.close_current()?;
        Ok(std::mem::take(&mut self.files))
    }

    fn open_next(&mut self) -> Result<()> {
        self.close_current()?;
        let path = self.dir.join(chunk_name(&self.prefix, self.files.len()));
        let file = File::create(&path).map_err(|e| Error::Write {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(chunk = %path.display(), "opened chunk");
        self.files.push(path);
        self.current = Some(file);
        self.written = 0;
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(file) = self.current.take() {
            file.sync_all().map_err(|e| Error::Write {
                path: self.current_path(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn current_path(&self) -> PathBuf {
        self.files.last().cloned().unwrap_or_else(|| self.dir.clone())
    }
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.current.is_none() || self.written >= self.limit {
            self.open_next()?;
        }

        let room = (self.limit - self.written).min(buf.len() as u64) as usize;
        let path = self.current_path();
        let file = match self.current.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::other("no chunk open")),
        };
        let n = file
            .write(&buf[..room])
            .map_err(|e| Error::Write { path, source: e })?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let path = self.current_path();
        match self.current.as_mut() {
            Some(file) => file
                .flush()
                .map_err(|e| Error::Write { path, source: e }.into()),
            None => Ok(()),
        }
    }
}

/// `Read` source that joins chunk files back into one stream.
///
/// Files are opened one at a time, only once the previous one is exhausted.
#[derive(Debug)]
pub struct SplitReader {
    files: Vec<PathBuf>,
    next: usize,
    current: Option<File>,
}

impl SplitReader {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            files: files.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
            next: 0,
            current: None,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Read for SplitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() {
                let Some(path) = self.files.get(self.next) else {
                    return Ok(0);
                };
                let file = File::open(path).map_err(|e| Error::Read {
                    path: path.clone(),
                    source: e,
                })?;
                tracing::debug!(chunk = %path.display(), "reading chunk");
                self.current = Some(file);
                self.next += 1;
            }

            if let Some(file) = self.current.as_mut() {
                let n = file.read(buf).map_err(|e| Error::Read {
                    path: self.files[self.next - 1].clone(),
                    source: e,
                })?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }
        }
    }
}
