//! Forcing written data to stable storage before a transfer is reported done.
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use tracing::{debug, warn};

/// A destination that can push its data past every cache it controls.
///
/// `flush` only empties in-process buffers; `sync` must additionally make
/// the data survive a crash or power loss once it returns.
pub trait Durable: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// For a network peer the best available guarantee is that every byte has
/// been handed to the kernel and the peer has been told the stream ended.
impl Durable for TcpStream {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.shutdown(Shutdown::Write)
    }
}

impl<D: Durable + ?Sized> Durable for &mut D {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

impl<D: Durable + ?Sized> Durable for Box<D> {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Syncs `sink`, then checks that `actual` bytes matched the `expected` size.
///
/// The sync always comes first and its failure is fatal: a transfer whose
/// durability cannot be confirmed is never reported as a success. With an
/// unknown `expected` size only the sync is performed.
pub fn finalize<D: Durable + ?Sized>(
    sink: &mut D,
    actual: u64,
    expected: Option<u64>,
) -> Result<()> {
    debug!("syncing destination to stable storage");
    sink.sync().map_err(Error::Sync)?;
    debug!("destination synced");

    verify_size(actual, expected)
}

/// Fails with [`Error::SizeMismatch`] when a known `expected` size differs from `actual`.
pub fn verify_size(actual: u64, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => {
            warn!(expected, actual, "transferred size does not match expected size");
            Err(Error::SizeMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}
