use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::str::FromStr;

use crate::{Error, Result};

/// Compression envelope around the tar stream.
///
/// Identified at the boundary by a single character, the same one `tar(1)`
/// uses for its flag: `z` (gzip), `j` (bzip2), `s` (zstd).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    Gzip,
    Bzip2,
    Zstd,
}

impl CompressionKind {
    pub const ALL: [Self; 3] = [Self::Gzip, Self::Bzip2, Self::Zstd];

    pub fn from_tag(tag: char) -> Result<Self> {
        match tag {
            'z' => Ok(Self::Gzip),
            'j' => Ok(Self::Bzip2),
            's' => Ok(Self::Zstd),
            other => Err(Error::UnsupportedCompression(other)),
        }
    }

    pub fn tag(self) -> char {
        match self {
            Self::Gzip => 'z',
            Self::Bzip2 => 'j',
            Self::Zstd => 's',
        }
    }

    /// Conventional file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
            Self::Zstd => "tar.zst",
        }
    }

    /// Create an encoder for this compression codec.
    pub fn encoder<W: Write>(self, writer: W) -> Result<Encoder<W>> {
        match self {
            Self::Gzip => Ok(Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            Self::Bzip2 => Ok(Encoder::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            ))),
            Self::Zstd => Ok(Encoder::Zstd(zstd::stream::write::Encoder::new(
                writer,
                zstd::DEFAULT_COMPRESSION_LEVEL,
            )?)),
        }
    }

    /// Create a decoder for this compression codec.
    ///
    /// Concatenated gzip members and bzip2 streams are read through, as `tar(1)` does.
    pub fn decoder<R: BufRead>(self, reader: R) -> Result<Decoder<R>> {
        match self {
            Self::Gzip => Ok(Decoder::Gzip(flate2::bufread::MultiGzDecoder::new(reader))),
            Self::Bzip2 => Ok(Decoder::Bzip2(bzip2::bufread::MultiBzDecoder::new(reader))),
            Self::Zstd => Ok(Decoder::Zstd(zstd::stream::read::Decoder::with_buffer(
                reader,
            )?)),
        }
    }
}

impl FromStr for CompressionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(tag), None) => Self::from_tag(tag),
            // Report the first character so the message still names what was given.
            (Some(tag), Some(_)) => Err(Error::UnsupportedCompression(tag)),
            (None, _) => Err(Error::UnsupportedCompression('\0')),
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Encoder wrapper for tar compression.
pub enum Encoder<W: Write> {
    Gzip(flate2::write::GzEncoder<W>),
    Bzip2(bzip2::write::BzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    /// Write the compression trailer and hand back the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Gzip(e) => e.finish(),
            Self::Bzip2(e) => e.finish(),
            Self::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(e) => e.write(buf),
            Self::Bzip2(e) => e.write(buf),
            Self::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(e) => e.flush(),
            Self::Bzip2(e) => e.flush(),
            Self::Zstd(e) => e.flush(),
        }
    }
}

impl<W: Write> fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Gzip(_) => CompressionKind::Gzip,
            Self::Bzip2(_) => CompressionKind::Bzip2,
            Self::Zstd(_) => CompressionKind::Zstd,
        };
        f.debug_tuple("Encoder").field(&kind).finish()
    }
}

/// Decoder wrapper for tar decompression.
pub enum Decoder<R: BufRead> {
    Gzip(flate2::bufread::MultiGzDecoder<R>),
    Bzip2(bzip2::bufread::MultiBzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, R>),
}

impl<R: BufRead> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(d) => d.read(buf),
            Self::Bzip2(d) => d.read(buf),
            Self::Zstd(d) => d.read(buf),
        }
    }
}

impl<R: BufRead> fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Gzip(_) => CompressionKind::Gzip,
            Self::Bzip2(_) => CompressionKind::Bzip2,
            Self::Zstd(_) => CompressionKind::Zstd,
        };
        f.debug_tuple("Decoder").field(&kind).finish()
    }
}
