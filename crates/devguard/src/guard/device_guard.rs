use std::marker::PhantomData;

use super::Captured;
use crate::backend::DeviceBackend;
use crate::device::{Device, DeviceIndex};
use crate::error::GuardError;

/// Switches a backend to a device for the lifetime of the guard.
///
/// `DeviceGuard<B>` is bound to `B::DEVICE_TYPE`. On construction it records
/// the backend's active index as the [original device](Self::original_device)
/// and switches to the requested one; on drop it switches back to the original,
/// however many times [`set_device`](Self::set_device) was called in between
/// and however the scope was left.
///
/// A guard is never cloned. Moving it moves the obligation to restore, and the
/// guard stays on the thread that created it, since the backend's index may be
/// per-thread state.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::convert::Infallible;
/// use devguard::{DeviceBackend, DeviceGuard, DeviceIndex, DeviceType};
///
/// #[derive(Debug, Default)]
/// struct Cuda(Cell<DeviceIndex>);
///
/// impl DeviceBackend for &Cuda {
///     const DEVICE_TYPE: DeviceType = DeviceType::Cuda;
///     type Error = Infallible;
///
///     fn current_index(&self) -> Result<DeviceIndex, Infallible> {
///         Ok(self.0.get())
///     }
///
///     fn set_current_index(&self, index: DeviceIndex) -> Result<(), Infallible> {
///         self.0.set(index);
///         Ok(())
///     }
/// }
///
/// let cuda = Cuda::default();
/// {
///     let guard = DeviceGuard::new(&cuda, 1).unwrap();
///     assert_eq!(guard.original_index(), 0);
///     assert_eq!(cuda.0.get(), 1);
/// }
/// assert_eq!(cuda.0.get(), 0);
/// ```
///
/// Guards cannot be duplicated:
///
/// ```compile_fail
/// # use std::cell::Cell;
/// # use std::convert::Infallible;
/// # use devguard::{DeviceBackend, DeviceGuard, DeviceIndex, DeviceType};
/// # #[derive(Debug, Default)]
/// # struct Cuda(Cell<DeviceIndex>);
/// # impl DeviceBackend for &Cuda {
/// #     const DEVICE_TYPE: DeviceType = DeviceType::Cuda;
/// #     type Error = Infallible;
/// #     fn current_index(&self) -> Result<DeviceIndex, Infallible> { Ok(self.0.get()) }
/// #     fn set_current_index(&self, index: DeviceIndex) -> Result<(), Infallible> {
/// #         self.0.set(index);
/// #         Ok(())
/// #     }
/// # }
/// let cuda = Cuda::default();
/// let guard = DeviceGuard::new(&cuda, 1).unwrap();
/// let copy = guard.clone();
/// ```
///
/// Nor sent to another thread, even when the backend itself is `Send`:
///
/// ```compile_fail
/// # use std::convert::Infallible;
/// # use std::sync::atomic::{AtomicI8, Ordering};
/// # use devguard::{DeviceBackend, DeviceGuard, DeviceIndex, DeviceType};
/// # static INDEX: AtomicI8 = AtomicI8::new(0);
/// # #[derive(Debug)]
/// # struct Cuda;
/// # impl DeviceBackend for Cuda {
/// #     const DEVICE_TYPE: DeviceType = DeviceType::Cuda;
/// #     type Error = Infallible;
/// #     fn current_index(&self) -> Result<DeviceIndex, Infallible> { Ok(INDEX.load(Ordering::SeqCst)) }
/// #     fn set_current_index(&self, index: DeviceIndex) -> Result<(), Infallible> {
/// #         INDEX.store(index, Ordering::SeqCst);
/// #         Ok(())
/// #     }
/// # }
/// let guard = DeviceGuard::new(Cuda, 1).unwrap();
/// std::thread::spawn(move || drop(guard));
/// ```
#[must_use = "the device is switched back as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DeviceGuard<B: DeviceBackend> {
    backend: B,
    captured: Captured,
    // Restore must happen on the capturing thread
    _local: PhantomData<*const ()>,
}

impl<B: DeviceBackend> DeviceGuard<B> {
    /// Switches `backend` to the device at `index`.
    ///
    /// With [`CURRENT_DEVICE`](crate::CURRENT_DEVICE) the guard stays on the
    /// active device: the backend is read once and not written.
    pub fn new(backend: B, index: DeviceIndex) -> Result<Self, GuardError<B::Error>> {
        Self::with_device(backend, Device::new(B::DEVICE_TYPE, index))
    }

    /// Switches `backend` to `device`.
    ///
    /// Fails with [`GuardError::TypeMismatch`], without calling the backend,
    /// when `device` is not of type `B::DEVICE_TYPE`.
    pub fn with_device(backend: B, device: Device) -> Result<Self, GuardError<B::Error>> {
        let captured = Captured::acquire(&backend, device)?;
        Ok(Self {
            backend,
            captured,
            _local: PhantomData,
        })
    }

    /// The device that was active when the guard was created.
    pub fn original_device(&self) -> Device {
        self.captured.original
    }

    /// The device this guard last switched to.
    ///
    /// Changes made to the backend without going through the guard are not
    /// reflected here.
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

    /// Switches to `device`.
    ///
    /// Does not touch the backend when `device` equals the current device or
    /// carries the [`CURRENT_DEVICE`](crate::CURRENT_DEVICE) index. The
    /// original device never changes.
    pub fn set_device(&mut self, device: Device) -> Result<(), GuardError<B::Error>> {
        self.captured.switch(&self.backend, device)
    }

    /// Switches to the device at `index` of this guard's type.
    pub fn set_index(&mut self, index: DeviceIndex) -> Result<(), GuardError<B::Error>> {
        self.set_device(Device::new(B::DEVICE_TYPE, index))
    }

    /// The backend this guard drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DeviceBackend> Drop for DeviceGuard<B> {
    fn drop(&mut self) {
        self.captured.release(&self.backend);
    }
}
