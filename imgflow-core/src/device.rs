use crate::error::{Error, Result};
use crate::platform;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Name prefixes of memory- or file-backed pseudo block devices.
///
/// These never correspond to physical media an operator could want to image.
pub const PSEUDO_DEVICE_PREFIXES: &[&str] = &["ram", "zram", "loop"];

/// How the host classifies a drive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriveType {
    /// A permanently attached disk (HDD, SSD, NVMe).
    Fixed,
    /// Removable media such as USB sticks and SD cards.
    Removable,
    /// CD/DVD/Blu-ray drives.
    Optical,
    #[default]
    Unknown,
}

/// Represents a block device discovered on the system.
///
/// This is a snapshot taken at enumeration time. Devices that are plugged in
/// or removed afterwards only show up on the next call to [`list_devices`].
#[derive(Clone, Debug, Default)]
pub struct DeviceDescriptor {
    /// The system path to the device (e.g., `/dev/sda`).
    pub path: PathBuf,
    /// The kernel-provided name of the device (e.g., "sda").
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// The total size of the device in bytes.
    pub size_bytes: u64,
    pub removable: bool,
    pub drive_type: DriveType,
    /// The primary mount point of one of the device's filesystems, if any.
    pub mount_point: String,
}

impl DeviceDescriptor {
    /// A stable, human-readable label: name, scaled size and model.
    ///
    /// Underscores in the model string are shown as spaces, and removable
    /// media get a ` (removable)` marker.
    pub fn label(&self) -> String {
        let mut label = format!(
            "{} {} {}",
            self.name,
            human_size(self.size_bytes),
            self.model.replace('_', " ")
        );
        if self.removable {
            label.push_str(" (removable)");
        }
        label
    }

    fn is_pseudo(&self) -> bool {
        PSEUDO_DEVICE_PREFIXES
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mount_info = if !self.mount_point.is_empty() {
            format!("[Mounted at {}]", self.mount_point)
        } else {
            "[Not mounted]".to_string()
        };

        write!(f, "{} {}", self.label(), mount_info)
    }
}

/// Formats a byte count with binary units, e.g. `1.5 GiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Applies the eligibility rules to a raw device list, preserving its order.
///
/// Optical drives and pseudo devices are always dropped; non-removable disks
/// are dropped only when `removable_only` is set.
///
/// # Errors
///
/// Returns [`Error::NoEligibleDevice`] if nothing is left.
pub fn filter_devices(
    devices: impl IntoIterator<Item = DeviceDescriptor>,
    removable_only: bool,
) -> Result<Vec<DeviceDescriptor>> {
    let eligible: Vec<_> = devices
        .into_iter()
        .filter(|device| {
            let keep = device.drive_type != DriveType::Optical
                && !device.is_pseudo()
                && (!removable_only || device.removable);
            if !keep {
                debug!(device = %device.name, "skipping ineligible device");
            }
            keep
        })
        .collect();

    if eligible.is_empty() {
        return Err(Error::NoEligibleDevice { removable_only });
    }
    Ok(eligible)
}

/// Lists the block devices an operator may back up from or flash to.
///
/// # Errors
///
/// [`Error::DeviceQuery`] if the host cannot be queried, and
/// [`Error::NoEligibleDevice`] if no device passes [`filter_devices`].
pub fn list_devices(removable_only: bool) -> Result<Vec<DeviceDescriptor>> {
    let devices = platform::query_devices().map_err(Error::DeviceQuery)?;
    debug!(found = devices.len(), removable_only, "queried block devices");
    filter_devices(devices, removable_only)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, drive_type: DriveType, removable: bool) -> DeviceDescriptor {
        DeviceDescriptor {
            path: PathBuf::from("/dev").join(name),
            name: name.to_string(),
            model: "Test_Model".to_string(),
            size_bytes: 8 * 1024 * 1024 * 1024,
            removable,
            drive_type,
            ..Default::default()
        }
    }

    fn host() -> Vec<DeviceDescriptor> {
        vec![
            device("sr0", DriveType::Optical, true),
            device("ram0", DriveType::Unknown, false),
            device("nvme0n1", DriveType::Fixed, false),
            device("sdb", DriveType::Removable, true),
        ]
    }

    fn names(devices: &[DeviceDescriptor]) -> Vec<&str> {
        devices.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn removable_only_keeps_just_removable_disks() {
        let devices = filter_devices(host(), true).unwrap();
        assert_eq!(names(&devices), vec!["sdb"]);
    }

    #[test]
    fn all_devices_still_exclude_optical_and_ram() {
        let devices = filter_devices(host(), false).unwrap();
        assert_eq!(names(&devices), vec!["nvme0n1", "sdb"]);
    }

    #[test]
    fn loop_and_zram_are_pseudo_devices() {
        let devices = vec![
            device("loop3", DriveType::Fixed, false),
            device("zram0", DriveType::Fixed, false),
            device("sda", DriveType::Fixed, false),
        ];
        assert_eq!(names(&filter_devices(devices, false).unwrap()), vec!["sda"]);
    }

    #[test]
    fn nothing_eligible_is_an_error() {
        let devices = vec![device("sr0", DriveType::Optical, true)];
        assert!(matches!(
            filter_devices(devices, false),
            Err(Error::NoEligibleDevice {
                removable_only: false
            })
        ));
        assert!(matches!(
            filter_devices(Vec::new(), true),
            Err(Error::NoEligibleDevice { removable_only: true })
        ));
    }

    #[test]
    fn label_normalizes_model_and_marks_removable() {
        let mut d = device("sdb", DriveType::Removable, true);
        d.size_bytes = 1536 * 1024 * 1024;
        d.model = "Ultra_Fit_USB".to_string();
        assert_eq!(d.label(), "sdb 1.5 GiB Ultra Fit USB (removable)");

        d.removable = false;
        assert_eq!(d.label(), "sdb 1.5 GiB Ultra Fit USB");
    }

    #[test]
    fn human_size_scales_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1024), "1.0 KiB");
        assert_eq!(human_size(1536 * 1024 * 1024), "1.5 GiB");
        assert_eq!(human_size(500_107_862_016), "465.8 GiB");
    }
}
