//! The buffered transfer loop shared by every imaging operation.
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

/// Default I/O chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Which end of a copy failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Read,
    Write,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Read => write!(f, "read"),
            Side::Write => write!(f, "write"),
        }
    }
}

/// A copy aborted by an I/O error, with the bytes safely written before it.
#[derive(Debug, thiserror::Error)]
#[error("{side} failed after {written} bytes: {source}")]
pub struct CopyError {
    pub side: Side,
    pub written: u64,
    #[source]
    pub source: io::Error,
}

/// Copies `src` into `dst` in chunks of at most `chunk_size` bytes.
///
/// One buffer is reused for the whole copy. After every chunk has been fully
/// written `on_chunk` receives the running total of bytes written. Returns
/// the total once `src` reports end of stream.
///
/// A write that accepts only part of a chunk is retried with the remainder;
/// a write that accepts nothing fails with [`ErrorKind::WriteZero`]. Reads
/// and writes interrupted by a signal are retried, anything else aborts.
///
/// # Errors
///
/// Returns an `InvalidInput` error on the read side if `chunk_size` is zero.
pub fn copy<R, W, F>(
    dst: &mut W,
    src: &mut R,
    chunk_size: usize,
    mut on_chunk: F,
) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(u64),
{
    let mut written: u64 = 0;
    if chunk_size == 0 {
        return Err(CopyError {
            side: Side::Read,
            written,
            source: io::Error::new(ErrorKind::InvalidInput, "chunk size must be non-zero"),
        });
    }

    let mut buffer = vec![0u8; chunk_size];
    loop {
        let n = match src.read(&mut buffer) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(CopyError {
                    side: Side::Read,
                    written,
                    source,
                });
            }
        };

        let mut chunk = &buffer[..n];
        while !chunk.is_empty() {
            match dst.write(chunk) {
                Ok(0) => {
                    return Err(CopyError {
                        side: Side::Write,
                        written,
                        source: io::Error::new(
                            ErrorKind::WriteZero,
                            "destination accepted no bytes",
                        ),
                    });
                }
                Ok(m) => {
                    chunk = &chunk[m..];
                    written += m as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(CopyError {
                        side: Side::Write,
                        written,
                        source,
                    });
                }
            }
        }

        on_chunk(written);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Accepts at most `limit` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts `budget` bytes and then reports zero progress forever.
    struct Full {
        budget: usize,
    }

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Yields `good` bytes, then fails.
    struct Failing {
        good: usize,
        interrupted_once: bool,
    }

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted_once {
                self.interrupted_once = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            if self.good == 0 {
                return Err(io::Error::other("device vanished"));
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(0xaa);
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn copies_with_partial_last_chunk() {
        let data = sample(10_000);
        let mut out: Vec<u8> = Vec::new();
        let mut totals = Vec::new();

        let written = copy(&mut out, &mut &data[..], 4096, |t| totals.push(t)).unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(out, data);
        assert_eq!(totals, vec![4096, 8192, 10_000]);
    }

    #[test]
    fn empty_source_writes_nothing() {
        let mut out: Vec<u8> = Vec::new();
        let mut calls = 0;
        let written = copy(&mut out, &mut io::empty(), 8, |_| calls += 1).unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn short_writes_are_retried_within_the_chunk() {
        let data = sample(1000);
        let mut sink = Trickle {
            data: Vec::new(),
            limit: 7,
        };
        let mut totals = Vec::new();

        let written = copy(&mut sink, &mut &data[..], 300, |t| totals.push(t)).unwrap();

        assert_eq!(written, 1000);
        assert_eq!(sink.data, data);
        assert_eq!(totals, vec![300, 600, 900, 1000]);
    }

    #[test]
    fn zero_progress_write_fails() {
        let data = sample(100);
        let mut sink = Full { budget: 40 };

        let err = copy(&mut sink, &mut &data[..], 64, |_| {}).unwrap_err();

        assert_eq!(err.side, Side::Write);
        assert_eq!(err.written, 40);
        assert_eq!(err.source.kind(), ErrorKind::WriteZero);
    }

    #[test]
    fn read_error_aborts_after_interrupt_retry() {
        let mut src = Failing {
            good: 10,
            interrupted_once: false,
        };
        let mut out: Vec<u8> = Vec::new();

        let err = copy(&mut out, &mut src, 4, |_| {}).unwrap_err();

        assert_eq!(err.side, Side::Read);
        assert_eq!(err.written, 10);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = copy(&mut Vec::<u8>::new(), &mut &b"abc"[..], 0, |_| {}).unwrap_err();
        assert_eq!(err.source.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.written, 0);
    }

    proptest! {
        #[test]
        fn copy_is_byte_exact_for_any_chunk_size(
            data in proptest::collection::vec(any::<u8>(), 0..20_000),
            chunk_size in 1usize..5_000,
        ) {
            let mut out: Vec<u8> = Vec::new();
            let mut last = 0;
            let written = copy(&mut out, &mut &data[..], chunk_size, |t| {
                assert!(t >= last);
                last = t;
            }).unwrap();

            prop_assert_eq!(written, data.len() as u64);
            prop_assert_eq!(out, data);
        }
    }
}
