use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A reader that starts failing once `running` is cleared by the Ctrl+C handler.
///
/// The core has no cancellation of its own; a failing source makes the copy
/// loop abort with an I/O error and release every stream on the way out.
pub struct Interruptible<R> {
    inner: R,
    running: Arc<AtomicBool>,
}

impl<R: Read> Interruptible<R> {
    pub fn new(inner: R, running: Arc<AtomicBool>) -> Self {
        Self { inner, running }
    }
}

impl<R: Read> Read for Interruptible<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.running.load(Ordering::SeqCst) {
            // Not `Interrupted`: that kind is retried by the copy loop.
            return Err(io::Error::other("Operation cancelled by user"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_after_flag_is_cleared() {
        let running = Arc::new(AtomicBool::new(true));
        let mut reader = Interruptible::new(&b"abcdef"[..], running.clone());

        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);

        running.store(false, Ordering::SeqCst);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
