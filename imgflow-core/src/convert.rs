//! Converting images between raw and compressed form without touching a device.
//!
//! A compressed image is decompressed next to itself with its suffix
//! stripped; a raw image is compressed next to itself with the codec's
//! suffix appended.
use crate::error::{Error, Result};
use crate::format::{self, CompressionKind};
use crate::transfer::{self, TransferOptions, TransferResult, TransferSink, TransferSource};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// What a conversion will do to an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionPlan {
    pub decode: CompressionKind,
    pub encode: CompressionKind,
    pub target: PathBuf,
}

/// Works out the direction and output name of converting `image`.
///
/// Images with a recognised suffix are decompressed, anything else is
/// compressed with `compress_with`.
///
/// # Errors
///
/// Fails with `InvalidInput` when the output would overwrite the input,
/// i.e. a raw image with `compress_with` set to [`CompressionKind::None`].
pub fn plan(image: &Path, compress_with: CompressionKind) -> Result<ConversionPlan> {
    let plan = match CompressionKind::from_path(image) {
        CompressionKind::None => ConversionPlan {
            decode: CompressionKind::None,
            encode: compress_with,
            target: compress_with.with_suffix(image),
        },
        kind => ConversionPlan {
            decode: kind,
            encode: CompressionKind::None,
            target: format::decompressed_name(image),
        },
    };

    if plan.target == image {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("converting {} would overwrite itself", image.display()),
        )));
    }
    Ok(plan)
}

/// Converts the image `source` was opened from, according to `plan`.
///
/// `on_progress` receives the number of source bytes consumed.
pub fn run<R, F>(
    source: TransferSource<R>,
    plan: &ConversionPlan,
    options: &TransferOptions,
    on_progress: F,
) -> Result<TransferResult>
where
    R: Read,
    F: FnMut(u64),
{
    info!(
        target = %plan.target.display(),
        decode = %plan.decode,
        encode = %plan.encode,
        "converting image"
    );

    let sink = TransferSink::create(&plan.target)?;
    transfer::run(source, sink, plan.decode, plan.encode, options, on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_images_are_decompressed_beside_themselves() {
        let plan = plan(Path::new("/img/disk.img.xz"), CompressionKind::Gzip).unwrap();
        assert_eq!(
            plan,
            ConversionPlan {
                decode: CompressionKind::Xz,
                encode: CompressionKind::None,
                target: PathBuf::from("/img/disk.img"),
            }
        );
    }

    #[test]
    fn raw_images_are_compressed_with_suffix() {
        let plan = plan(Path::new("disk.img"), CompressionKind::Gzip).unwrap();
        assert_eq!(plan.decode, CompressionKind::None);
        assert_eq!(plan.encode, CompressionKind::Gzip);
        assert_eq!(plan.target, PathBuf::from("disk.img.gz"));
    }

    #[test]
    fn refuses_to_overwrite_the_input() {
        let err = plan(Path::new("disk.img"), CompressionKind::None).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::InvalidInput));
    }
}
