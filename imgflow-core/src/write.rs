//! Contains the logic for writing an image file to a device ("flash").
//!
//! Compressed images (`.gz`, `.xz`) are decompressed on the fly while they
//! are written; nothing is staged in a temporary file. The container is
//! chosen from the image's name alone.
use crate::error::Result;
use crate::format::CompressionKind;
use crate::transfer::{self, TransferOptions, TransferResult, TransferSink, TransferSource};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{info, warn};

/// Writes an image to a block device.
///
/// The compression is detected from the source's path. Progress is reported
/// in bytes of the image file as stored, so for a compressed image the total
/// is its compressed size. The device is synced before this returns.
///
/// # Arguments
///
/// * `source` - The opened image (see [`TransferSource::open`]).
/// * `device_path` - Path to the target block device.
/// * `options` - Chunk size and whether to open the device with `O_SYNC`.
/// * `on_write_start` - Closure called once with the detected compression and
///   the image size.
/// * `on_write_progress` - Closure called with the number of image bytes consumed.
///
/// # Errors
///
/// This function will return an error if:
/// - The device cannot be opened.
/// - The image is not a valid stream of the container its name announces.
/// - An I/O error occurs while reading or writing.
/// - The device cannot be synced to stable storage.
/// - Fewer image bytes were consumed than the image's size.
pub fn run<R, F>(
    source: TransferSource<R>,
    device_path: &Path,
    options: &TransferOptions,
    on_write_start: impl FnOnce(CompressionKind, Option<u64>),
    on_write_progress: F,
) -> Result<TransferResult>
where
    R: Read,
    F: FnMut(u64),
{
    let compression = source
        .path()
        .map(CompressionKind::from_path)
        .unwrap_or_default();
    if let Some(path) = source.path() {
        warn_on_content_mismatch(path, compression);
    }

    info!(
        device = %device_path.display(),
        %compression,
        "flashing image to device"
    );

    let sink = TransferSink::open_device(device_path, options.sync_writes)?;
    on_write_start(compression, source.size());

    transfer::run(
        source,
        sink,
        compression,
        CompressionKind::None,
        options,
        on_write_progress,
    )
}

/// Logs a warning when the image's magic bytes disagree with its suffix.
///
/// Naming stays authoritative; this only helps explain the format error
/// that usually follows.
fn warn_on_content_mismatch(path: &Path, by_suffix: CompressionKind) {
    match sniff_file(path) {
        Ok(by_content) if by_content != by_suffix => {
            warn!(
                image = %path.display(),
                suffix = %by_suffix,
                content = %by_content,
                "image content does not look like its file suffix"
            );
        }
        Ok(_) => {}
        Err(e) => warn!(image = %path.display(), error = %e, "could not inspect image header"),
    }
}

/// Classifies a file by its first bytes.
pub fn sniff_file(path: &Path) -> io::Result<CompressionKind> {
    let mut header = Vec::with_capacity(8);
    File::open(path)?.take(8).read_to_end(&mut header)?;
    Ok(CompressionKind::sniff(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Encoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn file_with(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn sniffs_content_regardless_of_name() {
        let dir = TempDir::new().unwrap();
        for kind in CompressionKind::ALL {
            let mut encoder = Encoder::new(Vec::new(), kind, 1);
            encoder.write_all(b"boot sector").unwrap();
            let bytes = encoder.finish().unwrap();

            let path = file_with(&dir, "image.bin", &bytes);
            assert_eq!(sniff_file(&path).unwrap(), kind);
        }
    }

    #[test]
    fn sniffing_short_or_missing_files() {
        let dir = TempDir::new().unwrap();
        let empty = file_with(&dir, "empty.img.xz", &[]);
        assert_eq!(sniff_file(&empty).unwrap(), CompressionKind::None);

        let missing = dir.path().join("missing.img.gz");
        assert!(sniff_file(&missing).is_err());
        // Only logs; a header that cannot be read is not an error here.
        warn_on_content_mismatch(&missing, CompressionKind::Gzip);
        warn_on_content_mismatch(&empty, CompressionKind::Xz);
    }
}
