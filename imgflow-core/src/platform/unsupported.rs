use crate::device::DeviceDescriptor;
use std::fs::File;
use std::io;

/// Block device discovery is only implemented for Linux.
pub fn query_devices() -> io::Result<Vec<DeviceDescriptor>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "block device discovery is not supported on this platform",
    ))
}

/// Always `None`: device nodes cannot be sized on this platform.
pub fn block_device_size(_file: &File) -> io::Result<Option<u64>> {
    Ok(None)
}
