use std::error::Error;
use std::thread;

use tracing::error;

use crate::device::{DeviceIndex, DeviceType};

/// The contract any backend must fulfil for a guard to switch its device.
///
/// A backend owns a single piece of mutable state: the index of the device that
/// is currently active for its [`DeviceType`]. Whether that state is
/// process-wide or per-thread is up to the backend.
///
/// Methods take `&self`; backends are expected to be handles onto state that
/// lives elsewhere (a driver, a thread-local, shared atomics).
pub trait DeviceBackend {
    /// The device type this backend manages.
    const DEVICE_TYPE: DeviceType;

    /// Backend failure, passed through guards unchanged.
    type Error: Error + Send + Sync + 'static;

    /// Return the device type this backend manages
    fn device_type(&self) -> DeviceType {
        Self::DEVICE_TYPE
    }

    /// Return the index of the currently active device
    fn current_index(&self) -> Result<DeviceIndex, Self::Error>;

    /// Make `index` the currently active device
    fn set_current_index(&self, index: DeviceIndex) -> Result<(), Self::Error>;

    /// Make `index` the currently active device, returning the index that was
    /// active before.
    fn exchange_index(&self, index: DeviceIndex) -> Result<DeviceIndex, Self::Error> {
        let previous = self.current_index()?;
        self.set_current_index(index)?;
        Ok(previous)
    }

    /// Put `index` back as the active device from a guard's `Drop`.
    ///
    /// There is no caller left to hand an error to, so a failure here is fatal:
    /// it is logged and then panics, or aborts if the thread is already
    /// unwinding.
    fn restore_index(&self, index: DeviceIndex) {
        if let Err(err) = self.set_current_index(index) {
            error!(device_type = %Self::DEVICE_TYPE, index, error = %err, "failed to restore device index");
            if thread::panicking() {
                std::process::abort();
            }
            panic!("failed to restore {} device index {index}: {err}", Self::DEVICE_TYPE);
        }
    }
}
