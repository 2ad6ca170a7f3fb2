//! # Devices
//!
//! Plain value types naming a compute device: which kind of backend it lives on
//! ([`DeviceType`]) and which instance of that backend it is ([`DeviceIndex`]).
//!
//! A [`Device`] is `Copy` and compares structurally. Guards hand these values
//! across their boundary, so nothing in this module touches a backend.
//!
//! ## String form
//!
//! Devices print and parse as `type:index` (`cuda:1`), or just `type` (`cuda`)
//! when the index is [`CURRENT_DEVICE`].

use std::fmt;
use std::str::FromStr;

/// Ordinal selecting one device among the instances of a backend type.
pub type DeviceIndex = i8;

/// Sentinel index meaning "whichever device is active right now".
///
/// Only meaningful as an argument. Guards resolve it against the backend
/// before storing anything, so no guard getter ever reports it.
pub const CURRENT_DEVICE: DeviceIndex = -1;

/// The kind of backend a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    /// Host processor.
    Cpu,
    /// NVIDIA accelerators.
    Cuda,
    /// AMD accelerators.
    Hip,
    /// Apple GPUs.
    Metal,
    /// Vulkan compute devices.
    Vulkan,
    /// Intel accelerators.
    Xpu,
}

impl DeviceType {
    /// Every device type, in declaration order.
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Cpu,
        DeviceType::Cuda,
        DeviceType::Hip,
        DeviceType::Metal,
        DeviceType::Vulkan,
        DeviceType::Xpu,
    ];

    /// Lowercase name used by the string form.
    pub const fn name(self) -> &'static str {
        match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Cuda => "cuda",
            DeviceType::Hip => "hip",
            DeviceType::Metal => "metal",
            DeviceType::Vulkan => "vulkan",
            DeviceType::Xpu => "xpu",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceType {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| ParseDeviceError::UnknownDeviceType { name: s.to_string() })
    }
}

/// A device: a backend type paired with an index into that backend.
///
/// `Device` values are immutable. The index may be [`CURRENT_DEVICE`] when the
/// value is used as an input, e.g. `Device::new(DeviceType::Cuda, CURRENT_DEVICE)`
/// asks a guard to stay on whichever CUDA device is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    device_type: DeviceType,
    index: DeviceIndex,
}

impl Device {
    /// Creates a device from its type and index.
    pub const fn new(device_type: DeviceType, index: DeviceIndex) -> Self {
        Self { device_type, index }
    }

    /// The backend type this device belongs to.
    pub const fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// The index of this device within its backend.
    pub const fn index(&self) -> DeviceIndex {
        self.index
    }

    /// Whether the index is the [`CURRENT_DEVICE`] sentinel.
    pub const fn is_current(&self) -> bool {
        self.index == CURRENT_DEVICE
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_current() {
            write!(f, "{}", self.device_type)
        } else {
            write!(f, "{}:{}", self.device_type, self.index)
        }
    }
}

impl FromStr for Device {
    type Err = ParseDeviceError;

    /// Parses `type` or `type:index`.
    ///
    /// The index must be a non-negative number that fits a [`DeviceIndex`];
    /// leave it off to get [`CURRENT_DEVICE`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw_index) = match s.split_once(':') {
            Some((name, raw_index)) => (name, Some(raw_index)),
            None => (s, None),
        };

        let device_type = name.parse::<DeviceType>()?;
        let index = match raw_index {
            None => CURRENT_DEVICE,
            Some(raw) => raw
                .parse::<DeviceIndex>()
                .ok()
                .filter(|index| *index >= 0)
                .ok_or_else(|| ParseDeviceError::InvalidIndex { raw: raw.to_string() })?,
        };

        Ok(Device::new(device_type, index))
    }
}

/// Errors produced when parsing a [`Device`] or [`DeviceType`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDeviceError {
    /// The type name is not one of the known [`DeviceType`] names.
    #[error("unknown device type `{name}`")]
    UnknownDeviceType { name: String },
    /// The index part is not a non-negative number in range.
    #[error("invalid device index `{raw}`")]
    InvalidIndex { raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_equality_is_structural() {
        assert_eq!(Device::new(DeviceType::Cuda, 1), Device::new(DeviceType::Cuda, 1));
        assert_ne!(Device::new(DeviceType::Cuda, 1), Device::new(DeviceType::Hip, 1));
        assert_ne!(Device::new(DeviceType::Cuda, 1), Device::new(DeviceType::Cuda, 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Device::new(DeviceType::Cuda, 3).to_string(), "cuda:3");
        assert_eq!(Device::new(DeviceType::Metal, CURRENT_DEVICE).to_string(), "metal");
        assert_eq!(DeviceType::Xpu.to_string(), "xpu");
    }

    #[test]
    fn test_parse_with_index() {
        let device: Device = "hip:2".parse().unwrap();
        assert_eq!(device, Device::new(DeviceType::Hip, 2));
    }

    #[test]
    fn test_parse_without_index_is_current() {
        let device: Device = "cuda".parse().unwrap();
        assert!(device.is_current());
        assert_eq!(device.device_type(), DeviceType::Cuda);
    }

    #[test]
    fn test_parse_display_agree() {
        for ty in DeviceType::ALL {
            let device = Device::new(ty, 7);
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = "tpu:0".parse::<Device>().unwrap_err();
        assert_eq!(err, ParseDeviceError::UnknownDeviceType { name: "tpu".to_string() });
    }

    #[test]
    fn test_parse_rejects_bad_indices() {
        // The sentinel has no explicit spelling
        for raw in ["cuda:-1", "cuda:x", "cuda:", "cuda:128"] {
            assert!(
                matches!(raw.parse::<Device>(), Err(ParseDeviceError::InvalidIndex { .. })),
                "{raw} should not parse"
            );
        }
    }
}
