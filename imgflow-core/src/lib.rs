//! The core, UI-agnostic library for the `imgflow` disk imaging utility.
//!
//! `imgflow-core` streams raw block-device contents to and from image files,
//! detecting and applying gzip or xz compression on the fly, reporting
//! progress through callbacks and refusing to report success before the
//! destination has been synced and the byte count verified.
//!
//! The library is structured into several key modules:
//! - [`format`]: Suffix-based detection of the compression container.
//! - [`stream`]: Decoders and encoders that hide the container from the copy loop.
//! - [`mod@copy`]: The chunked copy primitive with partial-write handling.
//! - [`durability`]: Syncing the destination and verifying the transferred size.
//! - [`device`]: The `DeviceDescriptor` type and eligibility filtering.
//! - [`platform`]: Platform-specific logic for querying block devices.
//! - [`transfer`]: The pipeline that wires all of the above together.
//! - [`mod@read`], [`mod@write`] and [`convert`]: The three imaging operations.
//!
//! ## Example: Flashing an Image with Progress Reporting
//!
//! ```rust,no_run
//! use imgflow_core::{device, transfer::{TransferOptions, TransferSource}, write};
//! use std::path::Path;
//!
//! fn main() -> imgflow_core::Result<()> {
//!     let devices = device::list_devices(true)?;
//!     let target = &devices[0];
//!
//!     let image = TransferSource::open(Path::new("path/to/image.img.xz"))?;
//!     let result = write::run(
//!         image,
//!         &target.path,
//!         &TransferOptions::default(),
//!         |compression, total| println!("writing {compression} image, {total:?} bytes"),
//!         |bytes| println!("{bytes} bytes consumed"),
//!     )?;
//!
//!     println!("Wrote {} bytes to {}", result.bytes_written, target.label());
//!     Ok(())
//! }
//! ```

pub mod convert;
pub mod copy;
pub mod device;
pub mod durability;
mod error;
pub mod format;
mod os_options;
pub mod platform;
pub mod progress;
pub mod read;
pub mod stream;
pub mod transfer;
pub mod write;

pub use device::{DeviceDescriptor, DriveType, list_devices};
pub use error::{Error, Result};
pub use format::CompressionKind;
pub use transfer::{TransferOptions, TransferResult, TransferSink, TransferSource};
