//! Contains the logic for reading a device into an image file ("backup").
use crate::error::Result;
use crate::format::CompressionKind;
use crate::transfer::{self, TransferOptions, TransferResult, TransferSink, TransferSource};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Reads the entire contents of a block device to an image file.
///
/// The device is streamed through the `compression` encoder straight into
/// `image_path`; no temporary files are used. The image is synced to disk
/// before this function returns, and the number of bytes read is checked
/// against the size the device reported.
///
/// `image_path` is used as given. Callers that want the canonical suffix
/// should pass it through [`CompressionKind::with_suffix`] first.
///
/// # Arguments
///
/// * `source` - The opened device (see [`TransferSource::open`]).
/// * `image_path` - The path where the output image file will be created.
/// * `compression` - The container to write the image in.
/// * `options` - Chunk size and compression level.
/// * `on_read_start` - A closure that is called once at the beginning of the
///   operation, providing the total number of bytes that will be read.
/// * `on_progress` - A closure that is called repeatedly as data is read. It
///   receives the total number of bytes read so far.
///
/// # Errors
///
/// This function will return an error if:
/// - The output file cannot be created.
/// - An I/O error occurs during reading or writing.
/// - The image cannot be synced to stable storage.
/// - The device yielded a different number of bytes than its reported size.
pub fn run<R, F>(
    source: TransferSource<R>,
    image_path: &Path,
    compression: CompressionKind,
    options: &TransferOptions,
    on_read_start: impl FnOnce(Option<u64>),
    on_progress: F,
) -> Result<TransferResult>
where
    R: Read,
    F: FnMut(u64),
{
    info!(
        image = %image_path.display(),
        %compression,
        "backing up device to image"
    );

    let sink = TransferSink::create(image_path)?;
    on_read_start(source.size());

    transfer::run(
        source,
        sink,
        CompressionKind::None,
        compression,
        options,
        on_progress,
    )
}
