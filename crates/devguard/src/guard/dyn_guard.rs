use super::{Captured, Dynamic};
use crate::backend::{BoxedBackendError, DynBackend};
use crate::device::{Device, DeviceIndex, DeviceType};
use crate::error::GuardError;

/// [`DeviceGuard`](super::DeviceGuard) for a backend picked at run time.
///
/// Behaves exactly like `DeviceGuard`, except that the bound device type is
/// whatever [`DynBackend::device_type`] reports, and backend errors arrive
/// boxed.
#[must_use = "the device is switched back as soon as the guard is dropped"]
pub struct DynDeviceGuard<'a> {
    backend: &'a dyn DynBackend,
    captured: Captured,
}

impl<'a> DynDeviceGuard<'a> {
    /// Switches `backend` to the device at `index`.
    pub fn new(backend: &'a dyn DynBackend, index: DeviceIndex) -> Result<Self, GuardError<BoxedBackendError>> {
        Self::with_device(backend, Device::new(backend.device_type(), index))
    }

    /// Switches `backend` to `device`, rejecting devices of another type.
    pub fn with_device(backend: &'a dyn DynBackend, device: Device) -> Result<Self, GuardError<BoxedBackendError>> {
        let captured = Captured::acquire(&Dynamic(backend), device)?;
        Ok(Self { backend, captured })
    }

    /// The device type this guard is bound to.
    pub fn device_type(&self) -> DeviceType {
        self.backend.device_type()
    }

    /// The device that was active when the guard was created.
    pub fn original_device(&self) -> Device {
        self.captured.original
    }

    /// The device this guard last switched to.
    pub fn current_device(&self) -> Device {
        self.captured.current
    }

    /// Index of [`original_device`](Self::original_device).
    pub fn original_index(&self) -> DeviceIndex {
        self.captured.original.index()
    }

    /// Index of [`current_device`](Self::current_device).
    pub fn current_index(&self) -> DeviceIndex {
        self.captured.current.index()
    }

    /// Switches to `device`; see [`DeviceGuard::set_device`](super::DeviceGuard::set_device).
    pub fn set_device(&mut self, device: Device) -> Result<(), GuardError<BoxedBackendError>> {
        self.captured.switch(&Dynamic(self.backend), device)
    }

    /// Switches to the device at `index` of this guard's type.
    pub fn set_index(&mut self, index: DeviceIndex) -> Result<(), GuardError<BoxedBackendError>> {
        self.set_device(Device::new(self.device_type(), index))
    }
}

impl std::fmt::Debug for DynDeviceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynDeviceGuard")
            .field("device_type", &self.device_type())
            .field("original_device", &self.captured.original)
            .field("current_device", &self.captured.current)
            .finish()
    }
}

impl Drop for DynDeviceGuard<'_> {
    fn drop(&mut self) {
        self.captured.release(&Dynamic(self.backend));
    }
}
