//! Byte accounting shared between the copy loop and a progress reporter.
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically non-decreasing count of bytes observed during one transfer.
///
/// Clones share the same counter, so a reporter can hold a handle while the
/// transfer owns the stream that advances it. Create a new state for every
/// transfer; there is no way to move the count backwards.
#[derive(Clone, Debug, Default)]
pub struct ProgressState {
    bytes: Arc<AtomicU64>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes observed so far.
    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn advance(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }
}

/// A reader that records every byte it yields in a [`ProgressState`].
///
/// Placed directly over the stream whose size is known up front, beneath any
/// decompressor, so progress is measured in that stream's units.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    state: ProgressState,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, state: ProgressState) -> Self {
        Self { inner, state }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.state.advance(n as u64);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_byte_read() {
        let state = ProgressState::new();
        let mut reader = CountingReader::new(&[7u8; 10][..], state.clone());

        let mut buf = [0u8; 4];
        let mut seen = Vec::new();
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            seen.push(state.get());
        }

        assert_eq!(seen, vec![4, 8, 10]);
        assert_eq!(state.get(), 10);
    }

    #[test]
    fn clones_share_the_counter() {
        let state = ProgressState::new();
        let handle = state.clone();
        state.advance(5);
        state.advance(0);
        state.advance(3);
        assert_eq!(handle.get(), 8);
    }
}
