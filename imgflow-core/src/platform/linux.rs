use crate::device::{DeviceDescriptor, DriveType};
use nix::ioctl_read;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tracing::debug;

/// `/sys/block/<dev>/size` is always expressed in 512-byte sectors.
const SECTOR_SIZE: u64 = 512;

/// SCSI peripheral device type of CD/DVD drives.
const SCSI_TYPE_ROM: &str = "5";

ioctl_read!(blkgetsize64, 0x12, 114, u64);

/// Helper to read a specific file from the /sys/block filesystem.
fn read_sys_file(device_name: &str, file: &str) -> io::Result<String> {
    let path = PathBuf::from("/sys/block").join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

fn classify(device_name: &str, removable: bool) -> DriveType {
    let scsi_type = read_sys_file(device_name, "device/type").unwrap_or_default();
    if device_name.starts_with("sr") || scsi_type == SCSI_TYPE_ROM {
        DriveType::Optical
    } else if removable {
        DriveType::Removable
    } else {
        DriveType::Fixed
    }
}

/// Scans every block device the kernel exposes under `/sys/block`.
///
/// No eligibility filtering happens here apart from skipping devices that
/// report a size of zero (typically card readers with no card inserted);
/// see [`crate::device::filter_devices`] for the rules.
///
/// Vendor and model strings come from `/sys/block/<dev>/device/`, the mount
/// point from the `sysinfo` disk list.
///
/// # Errors
///
/// Fails only if `/sys/block` itself cannot be read. Unreadable attributes of
/// a single device fall back to empty or zero values.
pub fn query_devices() -> io::Result<Vec<DeviceDescriptor>> {
    let disks = sysinfo::Disks::new_with_refreshed_list();

    let entries: Vec<_> = fs::read_dir("/sys/block")?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();

    let mut devices = Vec::new();
    for device_name in entries {
        let size_sectors = read_sys_file(&device_name, "size")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        if size_sectors == 0 {
            debug!(device = %device_name, "skipping device with no media");
            continue;
        }

        let removable = read_sys_file(&device_name, "removable")
            .map(|s| s == "1")
            .unwrap_or(false);

        // Try to find a mount point by checking the `sysinfo` list.
        let mount_point = disks
            .iter()
            .filter(|disk| {
                let partition = disk.name().to_string_lossy();
                partition
                    .trim_start_matches("/dev/")
                    .starts_with(device_name.as_str())
            })
            .map(|disk| disk.mount_point().to_string_lossy().to_string())
            .find(|mp| !mp.is_empty())
            .unwrap_or_default();

        devices.push(DeviceDescriptor {
            path: PathBuf::from("/dev/").join(&device_name),
            vendor: read_sys_file(&device_name, "device/vendor").unwrap_or_default(),
            model: read_sys_file(&device_name, "device/model").unwrap_or_default(),
            size_bytes: size_sectors * SECTOR_SIZE,
            removable,
            drive_type: classify(&device_name, removable),
            mount_point,
            name: device_name,
        });
    }

    Ok(devices)
}

/// Returns the size of `file` if it is a block device node, using `BLKGETSIZE64`.
///
/// Regular files and other node types yield `Ok(None)`.
pub fn block_device_size(file: &File) -> io::Result<Option<u64>> {
    if !file.metadata()?.file_type().is_block_device() {
        return Ok(None);
    }

    let mut size_bytes: u64 = 0;
    // SAFETY: the descriptor is open for the lifetime of `file` and the
    // ioctl writes exactly one u64 into `size_bytes`.
    unsafe {
        blkgetsize64(file.as_raw_fd(), &mut size_bytes).map_err(io::Error::from)?;
    }
    Ok(Some(size_bytes))
}
