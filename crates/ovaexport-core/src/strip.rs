//! Removal of virtual hardware devices from a VMX file.
//!
//! Each removal deletes the device's keys and then forces its `present` key
//! to `FALSE`, so the device reads as absent whether or not it was there to
//! begin with. Running a removal twice leaves the same file as running it once.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::ui::Ui;
use crate::vmx::{self, VmxData};

/// Value VMware uses for a disabled device.
pub const DISABLED: &str = "FALSE";

/// A class of virtual device that can be stripped from a VMX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// The first network adapter.
    Ethernet,
    /// The first floppy drive.
    Floppy,
    /// The CD/DVD drive on the secondary IDE channel.
    OpticalDrive,
}

impl Device {
    /// Removal order used by the export pipeline.
    pub const ALL: [Device; 3] = [Device::Ethernet, Device::Floppy, Device::OpticalDrive];

    /// Keys starting with this prefix are deleted.
    ///
    /// The optical drive only loses its backing-file keys; the rest of the
    /// `ide1:0.` adapter settings stay.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Device::Ethernet => "ethernet0.",
            Device::Floppy => "floppy0.",
            Device::OpticalDrive => "ide1:0.file",
        }
    }

    /// The key that marks the device as present.
    pub fn present_key(self) -> &'static str {
        match self {
            Device::Ethernet => "ethernet0.present",
            Device::Floppy => "floppy0.present",
            Device::OpticalDrive => "ide1:0.present",
        }
    }

    /// Strip the device from an in-memory store.
    ///
    /// Returns the keys that were deleted.
    pub fn strip(self, data: &mut VmxData) -> Vec<String> {
        let removed = data.remove_prefixed(self.key_prefix());
        data.insert(self.present_key(), DISABLED);
        removed
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Ethernet => write!(f, "ethernet interface"),
            Device::Floppy => write!(f, "floppy drive"),
            Device::OpticalDrive => write!(f, "CD/DVD drive"),
        }
    }
}

/// Load the VMX at `path`, strip `device` from it and write it back.
///
/// Any load or save failure is wrapped in [`Error::DeviceRemoval`].
pub fn remove_device(ui: &dyn Ui, path: &Path, device: Device) -> Result<()> {
    announce_removal(ui, path, device);

    let mut data = vmx::load(path).map_err(|e| Error::device_removal(device, e))?;
    let removed = device.strip(&mut data);
    debug!(?device, ?removed, vmx = %path.display(), "stripped device keys");

    vmx::save(path, &data).map_err(|e| Error::device_removal(device, e))
}

pub(crate) fn announce_removal(ui: &dyn Ui, path: &Path, device: Device) {
    ui.message(&format!("Removing {} from {}", device, path.display()));
}

/// Remove the first ethernet adapter.
pub fn remove_ethernet(ui: &dyn Ui, path: &Path) -> Result<()> {
    remove_device(ui, path, Device::Ethernet)
}

/// Remove the first floppy drive.
pub fn remove_floppy(ui: &dyn Ui, path: &Path) -> Result<()> {
    remove_device(ui, path, Device::Floppy)
}

/// Remove the optical drive's backing file and disable the drive.
pub fn remove_optical_drive(ui: &dyn Ui, path: &Path) -> Result<()> {
    remove_device(ui, path, Device::OpticalDrive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VmxData {
        [
            ("displayName", "TestVM"),
            ("ethernet0.present", "TRUE"),
            ("ethernet0.virtualDev", "e1000"),
            ("ethernet1.present", "TRUE"),
            ("floppy0.present", "TRUE"),
            ("floppy0.fileType", "file"),
            ("ide1:0.present", "TRUE"),
            ("ide1:0.deviceType", "cdrom-image"),
            ("ide1:0.fileName", "ubuntu.iso"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_strip_ethernet_keeps_other_adapters() {
        let mut data = sample();
        Device::Ethernet.strip(&mut data);
        assert_eq!(data.get("ethernet0.present"), Some("FALSE"));
        assert_eq!(data.get("ethernet0.virtualDev"), None);
        assert_eq!(data.get("ethernet1.present"), Some("TRUE"));
    }

    #[test]
    fn test_strip_optical_keeps_adapter_settings() {
        let mut data = sample();
        let removed = Device::OpticalDrive.strip(&mut data);
        assert_eq!(removed, vec!["ide1:0.filename"]);
        assert_eq!(data.get("ide1:0.present"), Some("FALSE"));
        assert_eq!(data.get("ide1:0.deviceType"), Some("cdrom-image"));
    }

    #[test]
    fn test_strip_absent_device_still_disables() {
        let mut data = VmxData::new();
        let removed = Device::Floppy.strip(&mut data);
        assert!(removed.is_empty());
        assert_eq!(data.get("floppy0.present"), Some("FALSE"));
    }

    #[test]
    fn test_strip_is_idempotent() {
        for device in Device::ALL {
            let mut once = sample();
            device.strip(&mut once);
            let mut twice = once.clone();
            device.strip(&mut twice);
            assert_eq!(once, twice, "{device} removal not idempotent");
        }
    }

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Ethernet.to_string(), "ethernet interface");
        assert_eq!(Device::Floppy.to_string(), "floppy drive");
        assert_eq!(Device::OpticalDrive.to_string(), "CD/DVD drive");
    }
}
