//! # Device Guards
//!
//! Scoped objects that switch a backend's active device and switch it back when
//! they go out of scope, on every exit path including panic unwinding.
//!
//! ## Guards
//!
//! * [`DeviceGuard`] - always holds a device; bound to one backend type at compile time
//! * [`MaybeDeviceGuard`] - may start empty and be given a device later
//! * [`DynDeviceGuard`] - [`DeviceGuard`] over a backend chosen at run time
//!
//! ## Restore Semantics
//!
//! A guard records the backend's index the first time it touches the backend
//! (the *original* device) and the last device it switched to itself (the
//! *current* device). On drop it writes the original index back, once, no
//! matter how many switches happened in between.
//!
//! The current device only reflects writes made through the guard. If something
//! else changes the backend's index while the guard is alive, the guard does
//! not notice, and its drop still restores the original index.
//!
//! Guards nest: an inner guard's original device is whatever the outer guard
//! last set, and the inner guard puts exactly that back before control returns
//! to the outer scope.

mod device_guard;
mod dyn_guard;
mod maybe_guard;

pub use device_guard::DeviceGuard;
pub use dyn_guard::DynDeviceGuard;
pub use maybe_guard::MaybeDeviceGuard;

use tracing::{debug, trace};

use crate::backend::{BoxedBackendError, DeviceBackend, DynBackend};
use crate::device::{Device, DeviceIndex, DeviceType};
use crate::error::GuardError;

/// Backend access shared by the static and dynamic guards.
pub(crate) trait IndexControl {
    type Error;

    fn bound_type(&self) -> DeviceType;
    fn read_index(&self) -> Result<DeviceIndex, Self::Error>;
    fn write_index(&self, index: DeviceIndex) -> Result<(), Self::Error>;
    fn swap_index(&self, index: DeviceIndex) -> Result<DeviceIndex, Self::Error>;
    fn restore(&self, index: DeviceIndex);
}

impl<B: DeviceBackend> IndexControl for B {
    type Error = B::Error;

    fn bound_type(&self) -> DeviceType {
        B::DEVICE_TYPE
    }

    fn read_index(&self) -> Result<DeviceIndex, Self::Error> {
        DeviceBackend::current_index(self)
    }

    fn write_index(&self, index: DeviceIndex) -> Result<(), Self::Error> {
        DeviceBackend::set_current_index(self, index)
    }

    fn swap_index(&self, index: DeviceIndex) -> Result<DeviceIndex, Self::Error> {
        DeviceBackend::exchange_index(self, index)
    }

    fn restore(&self, index: DeviceIndex) {
        DeviceBackend::restore_index(self, index)
    }
}

/// A runtime-chosen backend seen through [`IndexControl`].
#[derive(Clone, Copy)]
pub(crate) struct Dynamic<'a>(pub(crate) &'a dyn DynBackend);

impl IndexControl for Dynamic<'_> {
    type Error = BoxedBackendError;

    fn bound_type(&self) -> DeviceType {
        self.0.device_type()
    }

    fn read_index(&self) -> Result<DeviceIndex, Self::Error> {
        self.0.current_index()
    }

    fn write_index(&self, index: DeviceIndex) -> Result<(), Self::Error> {
        self.0.set_current_index(index)
    }

    fn swap_index(&self, index: DeviceIndex) -> Result<DeviceIndex, Self::Error> {
        self.0.exchange_index(index)
    }

    fn restore(&self, index: DeviceIndex) {
        self.0.restore_index(index)
    }
}

/// The original and current device of a guard that has touched its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Captured {
    pub(crate) original: Device,
    pub(crate) current: Device,
}

impl Captured {
    /// Records the backend's index and switches to `device`.
    ///
    /// A [`CURRENT_DEVICE`](crate::CURRENT_DEVICE) index only reads the
    /// backend; any other index is exchanged in a single read and write.
    pub(crate) fn acquire<C>(backend: &C, device: Device) -> Result<Self, GuardError<C::Error>>
    where
        C: IndexControl,
    {
        check_type(backend.bound_type(), device)?;

        if device.is_current() {
            let index = backend.read_index().map_err(GuardError::Backend)?;
            let here = Device::new(device.device_type(), index);
            trace!(device = %here, "guard captured active device");
            return Ok(Self { original: here, current: here });
        }

        let previous = backend.swap_index(device.index()).map_err(GuardError::Backend)?;
        let original = Device::new(device.device_type(), previous);
        trace!(%original, current = %device, "guard captured device and switched");
        Ok(Self { original, current: device })
    }

    /// Switches to `device`, skipping the backend when nothing would change.
    pub(crate) fn switch<C>(&mut self, backend: &C, device: Device) -> Result<(), GuardError<C::Error>>
    where
        C: IndexControl,
    {
        check_type(backend.bound_type(), device)?;

        if device.is_current() || device == self.current {
            return Ok(());
        }

        backend.write_index(device.index()).map_err(GuardError::Backend)?;
        debug!(from = %self.current, to = %device, "guard switched device");
        self.current = device;
        Ok(())
    }

    /// Writes the original index back, reporting failure to the caller.
    pub(crate) fn restore_now<C>(&self, backend: &C) -> Result<(), GuardError<C::Error>>
    where
        C: IndexControl,
    {
        backend.write_index(self.original.index()).map_err(GuardError::Backend)?;
        trace!(original = %self.original, "guard restored device");
        Ok(())
    }

    /// Writes the original index back from `Drop`.
    pub(crate) fn release<C>(&self, backend: &C)
    where
        C: IndexControl,
    {
        backend.restore(self.original.index());
        trace!(original = %self.original, "guard restored device");
    }
}

fn check_type<E>(expected: DeviceType, device: Device) -> Result<(), GuardError<E>> {
    if device.device_type() != expected {
        debug!(%expected, actual = %device, "guard rejected device of another type");
        return Err(GuardError::TypeMismatch { expected, actual: device });
    }
    Ok(())
}
