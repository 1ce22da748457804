//! Streams a device to whoever connects, one connection at a time.
//!
//! The listener speaks no protocol of its own: a client receives the
//! (optionally compressed) image bytes and the connection is closed, e.g.
//! `nc <host> 2222 > backup.img.gz`.
use crate::interrupt::Interruptible;
use crate::ui;
use anyhow::Result;
use console::style;
use imgflow_core::{CompressionKind, TransferOptions, TransferSink, TransferSource, transfer};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Serves `device` on `port` until Ctrl+C clears `running`.
///
/// A failed transfer is reported and the listener keeps accepting; only a
/// failure of the listener itself ends the loop with an error.
pub fn run(
    device: &Path,
    port: u16,
    compression: CompressionKind,
    options: &TransferOptions,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    // Polling lets the loop notice Ctrl+C while no client is connected.
    listener.set_nonblocking(true)?;

    let suggested = compression.with_suffix("backup.img");
    println!("Waiting for incoming connections on port {port} (Ctrl+C to exit)...");
    println!(
        "  Receive with: {}",
        style(format!("nc <server-ip> {port} > {}", suggested.display())).cyan()
    );

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "accepted connection");
                stream.set_nonblocking(false)?;
                match send(device, stream, compression, options, running.clone()) {
                    Ok(bytes) => println!("{bytes} bytes sent to {peer}."),
                    Err(e) => {
                        warn!(%peer, error = %e, "transfer failed");
                        eprintln!("{} {e}", style("Transfer failed:").red().bold());
                    }
                }
                println!("Connection closed.");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn send(
    device: &Path,
    stream: TcpStream,
    compression: CompressionKind,
    options: &TransferOptions,
    running: Arc<AtomicBool>,
) -> imgflow_core::Result<u64> {
    let label = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "network peer".to_string());

    let source = TransferSource::open(device)?.map_reader(|r| Interruptible::new(r, running));
    let bar = ui::transfer_bar("Sending");
    ui::start_bar(&bar, source.size(), "green");

    let result = transfer::run(
        source,
        TransferSink::new(stream, label),
        CompressionKind::None,
        compression,
        options,
        |bytes| ui::track(&bar, bytes),
    );

    match &result {
        Ok(_) => bar.finish_with_message("Done."),
        Err(_) => bar.abandon_with_message("❌ Failed."),
    }
    result.map(|r| r.bytes_read)
}
