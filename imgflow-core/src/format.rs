//! Suffix-based detection of the compression container used by an image.
//!
//! Detection looks only at the trailing characters of a file name. The
//! [`CompressionKind::sniff`] helper can classify content by its magic bytes,
//! but it is only ever used for diagnostics and never changes naming.
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// The compression applied to an image stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    /// Raw bytes, no container.
    #[default]
    None,
    /// A gzip (`.gz`) container.
    Gzip,
    /// An xz/LZMA2 (`.xz`) container.
    Xz,
}

impl CompressionKind {
    /// Every kind, in detection order.
    pub const ALL: [CompressionKind; 3] =
        [CompressionKind::None, CompressionKind::Gzip, CompressionKind::Xz];

    /// Classifies a file name by its suffix: `.xz`, `.gz`, or anything else.
    ///
    /// The comparison ignores ASCII case, so `DISK.IMG.GZ` is gzip too.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let name = path.as_ref().to_string_lossy();
        Self::ALL
            .into_iter()
            .find(|kind| kind.is_suffix_of(&name))
            .unwrap_or(CompressionKind::None)
    }

    /// The canonical file suffix, including the leading dot. Empty for `None`.
    pub fn suffix(self) -> &'static str {
        match self {
            CompressionKind::None => "",
            CompressionKind::Gzip => ".gz",
            CompressionKind::Xz => ".xz",
        }
    }

    /// Short lowercase name of the format, used in messages.
    pub fn name(self) -> &'static str {
        match self {
            CompressionKind::None => "raw",
            CompressionKind::Gzip => "gzip",
            CompressionKind::Xz => "xz",
        }
    }

    /// The container magic bytes every stream of this kind starts with.
    pub fn magic(self) -> &'static [u8] {
        match self {
            CompressionKind::None => &[],
            CompressionKind::Gzip => GZIP_MAGIC,
            CompressionKind::Xz => XZ_MAGIC,
        }
    }

    /// Classifies the first bytes of a stream. Anything unrecognised is `None`.
    pub fn sniff(header: &[u8]) -> Self {
        [CompressionKind::Xz, CompressionKind::Gzip]
            .into_iter()
            .find(|kind| header.starts_with(kind.magic()))
            .unwrap_or(CompressionKind::None)
    }

    /// Returns `path` with this kind's suffix appended, unless it already ends with it.
    ///
    /// Applying this twice yields the same name as applying it once.
    pub fn with_suffix(self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if self == CompressionKind::None || self.is_suffix_of(&path.to_string_lossy()) {
            return path.to_path_buf();
        }

        let mut name = OsString::from(path.as_os_str());
        name.push(self.suffix());
        PathBuf::from(name)
    }

    fn is_suffix_of(self, name: &str) -> bool {
        let suffix = self.suffix();
        !suffix.is_empty()
            && name.len() >= suffix.len()
            && name.is_char_boundary(name.len() - suffix.len())
            && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strips exactly one recognised compression suffix from `path`.
///
/// `disk.img.xz` becomes `disk.img`; a name without a recognised suffix is
/// returned unchanged.
pub fn decompressed_name(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match CompressionKind::from_path(path) {
        CompressionKind::None => path.to_path_buf(),
        // The suffix is a single extension, so dropping the last one removes exactly it.
        _ => path.with_extension(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_suffix() {
        assert_eq!(CompressionKind::from_path("disk.img.xz"), CompressionKind::Xz);
        assert_eq!(CompressionKind::from_path("disk.img.gz"), CompressionKind::Gzip);
        assert_eq!(CompressionKind::from_path("/tmp/DISK.GZ"), CompressionKind::Gzip);
        assert_eq!(CompressionKind::from_path("disk.img"), CompressionKind::None);
        assert_eq!(CompressionKind::from_path("xz"), CompressionKind::None);
        assert_eq!(CompressionKind::from_path("disk.tgz"), CompressionKind::None);
    }

    #[test]
    fn suffix_addition_is_idempotent() {
        let once = CompressionKind::Gzip.with_suffix("disk.img");
        assert_eq!(once, PathBuf::from("disk.img.gz"));
        assert_eq!(CompressionKind::Gzip.with_suffix(&once), PathBuf::from("disk.img.gz"));

        let xz = CompressionKind::Xz.with_suffix(CompressionKind::Xz.with_suffix("a/b.img"));
        assert_eq!(xz, PathBuf::from("a/b.img.xz"));
    }

    #[test]
    fn no_compression_leaves_name_unchanged() {
        assert_eq!(CompressionKind::None.with_suffix("disk.img"), PathBuf::from("disk.img"));
        assert_eq!(decompressed_name("disk.img"), PathBuf::from("disk.img"));
    }

    #[test]
    fn strips_one_suffix() {
        assert_eq!(decompressed_name("disk.img.xz"), PathBuf::from("disk.img"));
        assert_eq!(decompressed_name("/data/disk.img.gz"), PathBuf::from("/data/disk.img"));
        assert_eq!(decompressed_name("disk.gz.gz"), PathBuf::from("disk.gz"));
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(CompressionKind::sniff(&[0x1f, 0x8b, 0x08, 0x00]), CompressionKind::Gzip);
        assert_eq!(
            CompressionKind::sniff(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            CompressionKind::Xz
        );
        assert_eq!(CompressionKind::sniff(b"\x1f"), CompressionKind::None);
        assert_eq!(CompressionKind::sniff(&[]), CompressionKind::None);
    }
}
