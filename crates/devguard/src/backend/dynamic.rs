use std::error::Error;
use std::thread;

use tracing::error;

use super::DeviceBackend;
use crate::device::{DeviceIndex, DeviceType};

/// Backend error as seen through a [`DynBackend`].
///
/// The original error is boxed, not rewrapped, so it can be downcast back to
/// the backend's own type.
pub type BoxedBackendError = Box<dyn Error + Send + Sync + 'static>;

/// Object-safe version of [`DeviceBackend`].
///
/// Use it when the backend is picked at run time, e.g. from a registry keyed
/// by [`DeviceType`]. It is implemented for every [`DeviceBackend`]; implement
/// it directly only for backends whose type is itself a runtime value.
pub trait DynBackend {
    /// Return the device type this backend manages
    fn device_type(&self) -> DeviceType;

    /// Return the index of the currently active device
    fn current_index(&self) -> Result<DeviceIndex, BoxedBackendError>;

    /// Make `index` the currently active device
    fn set_current_index(&self, index: DeviceIndex) -> Result<(), BoxedBackendError>;

    /// Make `index` the currently active device, returning the previous index
    fn exchange_index(&self, index: DeviceIndex) -> Result<DeviceIndex, BoxedBackendError> {
        let previous = self.current_index()?;
        self.set_current_index(index)?;
        Ok(previous)
    }

    /// Put `index` back as the active device from a guard's `Drop`.
    ///
    /// Same failure policy as [`DeviceBackend::restore_index`].
    fn restore_index(&self, index: DeviceIndex) {
        if let Err(err) = self.set_current_index(index) {
            let device_type = self.device_type();
            error!(%device_type, index, error = %err, "failed to restore device index");
            if thread::panicking() {
                std::process::abort();
            }
            panic!("failed to restore {device_type} device index {index}: {err}");
        }
    }
}

impl<B: DeviceBackend> DynBackend for B {
    fn device_type(&self) -> DeviceType {
        DeviceBackend::device_type(self)
    }

    fn current_index(&self) -> Result<DeviceIndex, BoxedBackendError> {
        DeviceBackend::current_index(self).map_err(Into::into)
    }

    fn set_current_index(&self, index: DeviceIndex) -> Result<(), BoxedBackendError> {
        DeviceBackend::set_current_index(self, index).map_err(Into::into)
    }

    fn exchange_index(&self, index: DeviceIndex) -> Result<DeviceIndex, BoxedBackendError> {
        DeviceBackend::exchange_index(self, index).map_err(Into::into)
    }

    fn restore_index(&self, index: DeviceIndex) {
        DeviceBackend::restore_index(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, FakeBackendError, FakeHip};

    #[test]
    fn test_blanket_impl_reports_static_type() {
        let backend = FakeBackend::<FakeHip>::with_index(3);
        let dynamic: &dyn DynBackend = &backend;

        assert_eq!(dynamic.device_type(), DeviceType::Hip);
        assert_eq!(dynamic.current_index().unwrap(), 3);
    }

    #[test]
    fn test_blanket_impl_writes_through() {
        let backend = FakeBackend::<FakeHip>::with_index(0);
        let dynamic: &dyn DynBackend = &backend;

        assert_eq!(dynamic.exchange_index(2).unwrap(), 0);
        assert_eq!(backend.index(), 2);
    }

    #[test]
    fn test_boxed_error_downcasts_to_backend_error() {
        let backend = FakeBackend::<FakeHip>::with_index(0);
        backend.fail_writes(true);
        let dynamic: &dyn DynBackend = &backend;

        let err = dynamic.set_current_index(1).unwrap_err();
        let err = err.downcast::<FakeBackendError>().unwrap();
        assert_eq!(
            *err,
            FakeBackendError::WriteRejected { device_type: DeviceType::Hip, index: 1 }
        );
    }
}
