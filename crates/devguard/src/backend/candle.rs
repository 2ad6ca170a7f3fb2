use candle_core::DeviceLocation;

use crate::device::{Device, DeviceIndex, DeviceType};

/// Errors converting between [`Device`] and candle's [`DeviceLocation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// candle has no location for this device type.
    #[error("candle has no device location for {device_type}")]
    Unsupported { device_type: DeviceType },
    /// The device still carries the "current device" sentinel, or a negative index.
    #[error("device {device} has no concrete index")]
    Unresolved { device: Device },
    /// candle's gpu id does not fit a [`DeviceIndex`].
    #[error("gpu id {gpu_id} is out of range for a device index")]
    OutOfRange { gpu_id: usize },
}

impl TryFrom<DeviceLocation> for Device {
    type Error = LocationError;

    fn try_from(location: DeviceLocation) -> Result<Self, Self::Error> {
        let index = |gpu_id: usize| {
            DeviceIndex::try_from(gpu_id).map_err(|_| LocationError::OutOfRange { gpu_id })
        };

        match location {
            DeviceLocation::Cpu => Ok(Device::new(DeviceType::Cpu, 0)),
            DeviceLocation::Cuda { gpu_id } => Ok(Device::new(DeviceType::Cuda, index(gpu_id)?)),
            DeviceLocation::Metal { gpu_id } => Ok(Device::new(DeviceType::Metal, index(gpu_id)?)),
        }
    }
}

impl TryFrom<Device> for DeviceLocation {
    type Error = LocationError;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        let gpu_id = || usize::try_from(device.index()).map_err(|_| LocationError::Unresolved { device });

        match device.device_type() {
            DeviceType::Cpu => Ok(DeviceLocation::Cpu),
            DeviceType::Cuda => Ok(DeviceLocation::Cuda { gpu_id: gpu_id()? }),
            DeviceType::Metal => Ok(DeviceLocation::Metal { gpu_id: gpu_id()? }),
            device_type => Err(LocationError::Unsupported { device_type }),
        }
    }
}

/// The [`Device`] a candle device lives on, ready to hand to a guard.
pub fn device_of(device: &candle_core::Device) -> Result<Device, LocationError> {
    Device::try_from(device.location())
}
