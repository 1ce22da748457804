//! Transparent (de)compression over raw byte streams.
//!
//! [`Decoder`] and [`Encoder`] pick their codec once, at construction, from a
//! [`CompressionKind`]. After that they are plain [`Read`]/[`Write`]
//! implementations and the copy loop does not care what sits underneath.
use crate::error::{Error, Result};
use crate::format::CompressionKind;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Chain, Cursor, Read, Write};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

/// Default compression level for gzip and xz output.
pub const DEFAULT_LEVEL: u32 = 6;

/// The already-validated header bytes, replayed in front of the rest of the stream.
type Replayed<R> = Chain<Cursor<Vec<u8>>, R>;

/// A reader yielding the decompressed contents of an image stream.
pub enum Decoder<R: Read> {
    Raw(R),
    Gzip(MultiGzDecoder<Replayed<R>>),
    Xz(XzDecoder<Replayed<R>>),
}

impl<R: Read> Decoder<R> {
    /// Wraps `reader` in the decoder for `kind`.
    ///
    /// For compressed kinds the container header is read and checked up front,
    /// so a truncated or foreign file fails here with [`Error::Format`] rather
    /// than somewhere in the middle of the copy.
    pub fn new(reader: R, kind: CompressionKind) -> Result<Self> {
        Ok(match kind {
            CompressionKind::None => Decoder::Raw(reader),
            CompressionKind::Gzip => {
                Decoder::Gzip(MultiGzDecoder::new(replay_header(reader, kind)?))
            }
            CompressionKind::Xz => {
                Decoder::Xz(XzDecoder::new_multi_decoder(replay_header(reader, kind)?))
            }
        })
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Raw(r) => r.read(buf),
            Decoder::Gzip(r) => r.read(buf),
            Decoder::Xz(r) => r.read(buf),
        }
    }
}

fn replay_header<R: Read>(mut reader: R, kind: CompressionKind) -> Result<Replayed<R>> {
    let magic = kind.magic();
    let mut header = Vec::with_capacity(magic.len());
    reader.by_ref().take(magic.len() as u64).read_to_end(&mut header)?;

    if header.len() < magic.len() {
        return Err(Error::format(
            kind.name(),
            format!("truncated header ({} of {} bytes)", header.len(), magic.len()),
        ));
    }
    if header != magic {
        return Err(Error::format(kind.name(), "header magic does not match"));
    }
    Ok(Cursor::new(header).chain(reader))
}

/// Converts an error raised while reading through a decoder into the crate taxonomy.
///
/// Codec libraries report corrupt input as `InvalidData`/`InvalidInput`, and a
/// stream cut off mid-member as `UnexpectedEof`; those are format errors. Any
/// other kind came from the underlying stream and stays an I/O error.
pub(crate) fn classify_read_error(kind: CompressionKind, err: io::Error) -> Error {
    let corrupt = matches!(
        err.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    );
    if kind != CompressionKind::None && corrupt {
        Error::format(kind.name(), err.to_string())
    } else {
        Error::Io(err)
    }
}

/// A writer that compresses everything written to it before passing it on.
///
/// Call [`Encoder::finish`] to write the container trailer; only then is the
/// underlying writer handed back, so it cannot be closed before the trailer
/// is out. A transfer that fails must call [`Encoder::abandon`] instead, so
/// the partial output never ends in a valid trailer.
pub enum Encoder<W: Write> {
    Raw(W),
    Gzip(GzEncoder<Abandonable<W>>),
    Xz(XzEncoder<Abandonable<W>>),
}

/// The writer beneath a compressing encoder.
///
/// Both codec encoders write their trailer when dropped. Once abandoned,
/// every write and flush fails, so that trailer never reaches the destination.
pub struct Abandonable<W> {
    inner: W,
    abandoned: bool,
}

impl<W: Write> Abandonable<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            abandoned: false,
        }
    }

    fn check(&self) -> io::Result<()> {
        if self.abandoned {
            return Err(io::Error::other("compressed stream was abandoned"));
        }
        Ok(())
    }
}

impl<W: Write> Write for Abandonable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.inner.flush()
    }
}

impl<W: Write> Encoder<W> {
    /// Wraps `writer` in the encoder for `kind`. `level` is clamped to `0..=9`.
    pub fn new(writer: W, kind: CompressionKind, level: u32) -> Self {
        let level = level.min(9);
        match kind {
            CompressionKind::None => Encoder::Raw(writer),
            CompressionKind::Gzip => Encoder::Gzip(GzEncoder::new(
                Abandonable::new(writer),
                flate2::Compression::new(level),
            )),
            CompressionKind::Xz => Encoder::Xz(XzEncoder::new(Abandonable::new(writer), level)),
        }
    }

    /// Writes any buffered data and the container trailer, then returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Raw(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(w) => w.finish().map(|w| w.inner),
            Encoder::Xz(w) => w.finish().map(|w| w.inner),
        }
    }

    /// Drops the encoder without writing the container trailer.
    ///
    /// Whatever was already written stays a truncated stream that no decoder
    /// accepts as complete.
    pub fn abandon(self) {
        match self {
            Encoder::Raw(_) => {}
            Encoder::Gzip(mut w) => w.get_mut().abandoned = true,
            Encoder::Xz(mut w) => w.get_mut().abandoned = true,
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Raw(w) => w.write(buf),
            Encoder::Gzip(w) => w.write(buf),
            Encoder::Xz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Raw(w) => w.flush(),
            Encoder::Gzip(w) => w.flush(),
            Encoder::Xz(w) => w.flush(),
        }
    }
}
