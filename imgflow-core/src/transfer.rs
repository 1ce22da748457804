//! The end-to-end transfer pipeline.
//!
//! A transfer drains a [`TransferSource`] into a [`TransferSink`]:
//!
//! ```text
//! source ─▶ CountingReader ─▶ Decoder ─▶ copy ─▶ Encoder ─▶ sink ─▶ finalize
//! ```
//!
//! Progress is counted on the source itself, the only stream whose size is
//! known before the transfer starts. When flashing a compressed image the
//! progress bar therefore moves in compressed bytes.
use crate::copy::{self, Side};
use crate::durability::{self, Durable};
use crate::error::{Error, Result};
use crate::format::CompressionKind;
use crate::os_options::OpenOptionsExt;
use crate::platform;
use crate::progress::{CountingReader, ProgressState};
use crate::stream::{self, Decoder, Encoder};
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

/// Tunables shared by every transfer.
#[derive(Clone, Debug)]
pub struct TransferOptions {
    /// Bytes moved per read/write cycle. Must be non-zero.
    pub chunk_size: usize,
    /// gzip/xz level, `0..=9`.
    pub compression_level: u32,
    /// Open device destinations with `O_SYNC`.
    pub sync_writes: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: copy::DEFAULT_CHUNK_SIZE,
            compression_level: stream::DEFAULT_LEVEL,
            sync_writes: true,
        }
    }
}

/// A readable stream and, if known, how many bytes it will yield.
#[derive(Debug)]
pub struct TransferSource<R> {
    reader: R,
    size: Option<u64>,
    path: Option<PathBuf>,
}

impl TransferSource<File> {
    /// Opens a file or block device for reading.
    ///
    /// The size comes from `BLKGETSIZE64` for block devices and from the
    /// file metadata for regular files. Anything else has an unknown size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let size = match platform::block_device_size(&file)? {
            Some(size) => Some(size),
            None => {
                let metadata = file.metadata()?;
                metadata.is_file().then(|| metadata.len())
            }
        };
        debug!(path = %path.display(), ?size, "opened transfer source");

        Ok(Self {
            reader: file,
            size,
            path: Some(path.to_path_buf()),
        })
    }
}

impl<R: Read> TransferSource<R> {
    pub fn new(reader: R, size: Option<u64>) -> Self {
        Self {
            reader,
            size,
            path: None,
        }
    }

    /// Total bytes the source is expected to yield, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The file the source was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Wraps the underlying reader, keeping the size and path.
    pub fn map_reader<S: Read>(self, f: impl FnOnce(R) -> S) -> TransferSource<S> {
        TransferSource {
            reader: f(self.reader),
            size: self.size,
            path: self.path,
        }
    }
}

/// A writable destination that can be flushed to stable storage.
#[derive(Debug)]
pub struct TransferSink<W> {
    writer: W,
    label: String,
}

impl TransferSink<File> {
    /// Creates (or truncates) an image file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file, path.display().to_string()))
    }

    /// Opens an existing device (or file) for overwriting in place.
    ///
    /// With `sync_writes` every write goes straight through to the device.
    pub fn open_device(path: impl AsRef<Path>, sync_writes: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .sync_writes(sync_writes)
            .open(path)?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl<W: Durable> TransferSink<W> {
    /// Wraps any durable writer, e.g. a network stream. `label` is used in logs.
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer,
            label: label.into(),
        }
    }
}

/// The byte accounting of a successful transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferResult {
    /// Bytes pulled from the source stream (compressed bytes when decoding).
    pub bytes_read: u64,
    /// Bytes handed to the destination before any compression was applied.
    pub bytes_written: u64,
    /// The source's announced size. When known, equal to `bytes_read`.
    pub expected_size: Option<u64>,
}

/// Runs one transfer from `source` to `sink`.
///
/// `decode` names the container the source is in, `encode` the one to wrap
/// the sink in. `on_progress` receives the number of source bytes consumed
/// after every chunk; the count never decreases.
///
/// Once the copy completes the encoder trailer is written, the sink synced,
/// and the consumed byte count checked against the source's size. Every
/// stream is closed on return, whatever the outcome; a partially written
/// destination is left in place.
///
/// # Errors
///
/// - [`Error::InvalidChunkSize`] for a zero `chunk_size`.
/// - [`Error::Format`] if the source is not a valid `decode` stream.
/// - [`Error::Io`] for any read or write failure.
/// - [`Error::Sync`] if the destination cannot be synced.
/// - [`Error::SizeMismatch`] if the source ended early or ran long.
pub fn run<R, W, F>(
    source: TransferSource<R>,
    sink: TransferSink<W>,
    decode: CompressionKind,
    encode: CompressionKind,
    options: &TransferOptions,
    mut on_progress: F,
) -> Result<TransferResult>
where
    R: Read,
    W: Durable,
    F: FnMut(u64),
{
    if options.chunk_size == 0 {
        return Err(Error::InvalidChunkSize);
    }

    let _span = info_span!("transfer", sink = %sink.label, %decode, %encode).entered();
    info!(expected_size = ?source.size, "starting transfer");

    let progress = ProgressState::new();
    let expected_size = source.size;
    let counted = CountingReader::new(source.reader, progress.clone());
    let mut decoder = Decoder::new(counted, decode)?;
    let mut encoder = Encoder::new(sink.writer, encode, options.compression_level);

    let copied = copy::copy(&mut encoder, &mut decoder, options.chunk_size, |_| {
        on_progress(progress.get())
    });
    let bytes_written = match copied {
        Ok(n) => n,
        Err(e) => {
            encoder.abandon();
            return Err(match e.side {
                Side::Read => stream::classify_read_error(decode, e.source),
                Side::Write => Error::Io(e.source),
            });
        }
    };

    let bytes_read = progress.get();
    on_progress(bytes_read);
    debug!(bytes_read, bytes_written, "copy complete, finishing stream");

    let mut writer = encoder.finish()?;
    durability::finalize(&mut writer, bytes_read, expected_size)?;

    info!(bytes_read, bytes_written, "transfer complete");
    Ok(TransferResult {
        bytes_read,
        bytes_written,
        expected_size,
    })
}
