use std::marker::PhantomData;

use super::Captured;
use crate::backend::DeviceBackend;
use crate::device::{Device, DeviceIndex};
use crate::error::GuardError;

/// A [`DeviceGuard`](super::DeviceGuard) that may not hold a device yet.
///
/// An empty guard costs nothing: it does not read the backend when created and
/// does not write it when dropped. The first [`set_device`](Self::set_device)
/// populates it exactly the way constructing a `DeviceGuard` would, recording
/// the backend's active index as the original device. From then on it behaves
/// like a `DeviceGuard`.
///
/// This lets a scope decide late, or not at all, whether it needs to switch
/// devices.
///
/// Once populated, the original device is fixed for the rest of the guard's
/// life, and like `DeviceGuard` it never leaves the thread that created it:
///
/// ```compile_fail
/// # use std::convert::Infallible;
/// # use std::sync::atomic::{AtomicI8, Ordering};
/// # use devguard::{DeviceBackend, DeviceIndex, DeviceType, MaybeDeviceGuard};
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
/// let mut guard = MaybeDeviceGuard::new(Cuda);
/// guard.set_index(1).unwrap();
/// std::thread::spawn(move || drop(guard));
/// ```
#[must_use = "the device is switched back as soon as the guard is dropped"]
#[derive(Debug)]
pub struct MaybeDeviceGuard<B: DeviceBackend> {
    backend: B,
    captured: Option<Captured>,
    _local: PhantomData<*const ()>,
}

impl<B: DeviceBackend> MaybeDeviceGuard<B> {
    /// Creates an empty guard. The backend is not touched.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            captured: None,
            _local: PhantomData,
        }
    }

    /// Creates a guard holding `device`, or an empty guard for `None`.
    pub fn from_option(backend: B, device: Option<Device>) -> Result<Self, GuardError<B::Error>> {
        let mut guard = Self::new(backend);
        if let Some(device) = device {
            guard.set_device(device)?;
        }
        Ok(guard)
    }

    /// Creates a guard switched to the device at `index`.
    pub fn with_index(backend: B, index: DeviceIndex) -> Result<Self, GuardError<B::Error>> {
        Self::with_device(backend, Device::new(B::DEVICE_TYPE, index))
    }

    /// Creates a guard switched to `device`.
    pub fn with_device(backend: B, device: Device) -> Result<Self, GuardError<B::Error>> {
        Self::from_option(backend, Some(device))
    }

    /// The device that was active when the guard was populated, `None` while empty.
    pub fn original_device(&self) -> Option<Device> {
        self.captured.map(|captured| captured.original)
    }

    /// The device this guard last switched to, `None` while empty.
    pub fn current_device(&self) -> Option<Device> {
        self.captured.map(|captured| captured.current)
    }

    /// Index of [`original_device`](Self::original_device).
    pub fn original_index(&self) -> Option<DeviceIndex> {
        self.original_device().map(|device| device.index())
    }

    /// Index of [`current_device`](Self::current_device).
    pub fn current_index(&self) -> Option<DeviceIndex> {
        self.current_device().map(|device| device.index())
    }

    /// Whether the guard holds a device.
    pub fn is_populated(&self) -> bool {
        self.captured.is_some()
    }

    /// Switches to `device`, populating the guard if it is empty.
    ///
    /// The type check happens first in both states, so a mismatched device is
    /// rejected even by an empty guard.
    pub fn set_device(&mut self, device: Device) -> Result<(), GuardError<B::Error>> {
        match &mut self.captured {
            Some(captured) => captured.switch(&self.backend, device),
            None => {
                self.captured = Some(Captured::acquire(&self.backend, device)?);
                Ok(())
            }
        }
    }

    /// Switches to the device at `index` of this guard's type.
    pub fn set_index(&mut self, index: DeviceIndex) -> Result<(), GuardError<B::Error>> {
        self.set_device(Device::new(B::DEVICE_TYPE, index))
    }

    /// Restores the original device now and ends the guard.
    ///
    /// This is an early, fallible drop: the guard is consumed, so its original
    /// device can never be replaced by a later capture. An empty guard ends
    /// without touching the backend. If the backend refuses the write, the
    /// guard is handed back still populated, together with the error, and
    /// keeps its obligation to restore.
    pub fn reset(mut self) -> Result<(), (Self, GuardError<B::Error>)> {
        if let Some(captured) = self.captured {
            if let Err(err) = captured.restore_now(&self.backend) {
                return Err((self, err));
            }
            // Restored; the drop below must not write again
            self.captured = None;
        }
        Ok(())
    }

    /// The backend this guard drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DeviceBackend + Default> Default for MaybeDeviceGuard<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl<B: DeviceBackend> Drop for MaybeDeviceGuard<B> {
    fn drop(&mut self) {
        if let Some(captured) = &self.captured {
            captured.release(&self.backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, FakeBackendError, FakeCuda};
    use crate::device::{CURRENT_DEVICE, DeviceType};
    use crate::guard::DeviceGuard;

    type TestBackend = FakeBackend<FakeCuda>;
    type MaybeTestGuard = MaybeDeviceGuard<TestBackend>;

    fn dev(index: DeviceIndex) -> Device {
        Device::new(DeviceType::Cuda, index)
    }

    #[test]
    fn test_constructors_capture_and_restore() {
        for i in [CURRENT_DEVICE, 0, 1] {
            let init = 0;
            let expected = if i == CURRENT_DEVICE { init } else { i };
            let backend = TestBackend::with_index(init);

            let check = |guard: &MaybeTestGuard| {
                assert_eq!(guard.original_device(), Some(dev(init)));
                assert_eq!(guard.current_device(), Some(dev(expected)));
                assert_eq!(backend.index(), expected);
                // Un-bracketed write to the device index
                backend.force_index(4);
            };

            {
                let guard = MaybeTestGuard::with_index(backend.clone(), i).unwrap();
                check(&guard);
            }
            assert_eq!(backend.index(), init);

            {
                let guard = MaybeTestGuard::with_device(backend.clone(), dev(i)).unwrap();
                check(&guard);
            }
            assert_eq!(backend.index(), init);

            {
                let guard = MaybeTestGuard::from_option(backend.clone(), Some(dev(i))).unwrap();
                check(&guard);
            }
            assert_eq!(backend.index(), init);
        }
    }

    #[test]
    fn test_empty_guard_never_touches_backend() {
        let backend = TestBackend::with_index(0);

        let check = |guard: &MaybeTestGuard| {
            assert_eq!(guard.original_device(), None);
            assert_eq!(guard.current_device(), None);
            assert!(!guard.is_populated());
        };

        {
            let guard = MaybeTestGuard::new(backend.clone());
            check(&guard);
        }
        {
            let guard = MaybeTestGuard::from_option(backend.clone(), None).unwrap();
            check(&guard);
        }
        {
            let guard = MaybeTestGuard::default();
            check(&guard);
        }

        assert_eq!(backend.index(), 0);
        assert_eq!(backend.reads(), 0);
        assert_eq!(backend.writes(), 0);
    }

    #[test]
    fn test_set_device_populates() {
        let init = 0;
        let backend = TestBackend::with_index(init);
        let mut guard = MaybeTestGuard::new(backend.clone());

        let i = init + 1;
        guard.set_device(dev(i)).unwrap();
        assert_eq!(guard.original_device(), Some(dev(init)));
        assert_eq!(guard.current_device(), Some(dev(i)));
        assert_eq!(backend.index(), i);
        let writes = backend.writes();

        guard.set_device(dev(i)).unwrap();
        assert_eq!(guard.original_device(), Some(dev(init)));
        assert_eq!(guard.current_device(), Some(dev(i)));
        assert_eq!(backend.index(), i);
        assert_eq!(backend.writes(), writes);
    }

    #[test]
    fn test_set_index_populates_then_restores() {
        let backend = TestBackend::with_index(0);
        {
            let mut guard = MaybeTestGuard::new(backend.clone());
            guard.set_index(1).unwrap();
            assert_eq!(guard.original_device(), Some(dev(0)));
            assert_eq!(guard.current_device(), Some(dev(1)));
            assert_eq!(backend.index(), 1);

            guard.set_index(1).unwrap();
            assert_eq!(guard.current_index(), Some(1));
            assert_eq!(guard.original_index(), Some(0));
        }
        assert_eq!(backend.index(), 0);
    }

    #[test]
    fn test_original_never_changes_once_populated() {
        let backend = TestBackend::with_index(0);
        let mut guard = MaybeTestGuard::new(backend.clone());

        guard.set_index(2).unwrap();
        assert_eq!(guard.original_device(), Some(dev(0)));

        // Neither out-of-band writes nor later switches move the original
        backend.force_index(5);
        guard.set_index(1).unwrap();
        assert_eq!(guard.original_device(), Some(dev(0)));
        guard.set_index(CURRENT_DEVICE).unwrap();
        guard.set_index(3).unwrap();
        assert_eq!(guard.original_device(), Some(dev(0)));
        assert_eq!(guard.current_device(), Some(dev(3)));

        drop(guard);
        assert_eq!(backend.index(), 0);
    }

    #[test]
    fn test_populated_matches_device_guard() {
        let plain = TestBackend::with_index(1);
        let maybe = TestBackend::with_index(1);

        let mut guard = DeviceGuard::new(plain.clone(), 3).unwrap();
        let mut maybe_guard = MaybeTestGuard::new(maybe.clone());
        maybe_guard.set_index(3).unwrap();

        for i in [3, 0, CURRENT_DEVICE, 2] {
            guard.set_index(i).unwrap();
            maybe_guard.set_index(i).unwrap();
            assert_eq!(maybe_guard.current_device(), Some(guard.current_device()));
            assert_eq!(maybe.index(), plain.index());
            assert_eq!(maybe.writes(), plain.writes());
        }
    }

    #[test]
    fn test_empty_guard_rejects_other_device_type() {
        let backend = TestBackend::with_index(0);
        let mut guard = MaybeTestGuard::new(backend.clone());

        let err = guard.set_device(Device::new(DeviceType::Hip, 1)).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(!guard.is_populated());
        assert_eq!(backend.reads(), 0);
        assert_eq!(backend.writes(), 0);

        assert!(MaybeTestGuard::with_device(backend.clone(), Device::new(DeviceType::Hip, 1)).is_err());
        assert_eq!(backend.reads(), 0);
    }

    #[test]
    fn test_reset_restores_and_ends_guard() {
        let backend = TestBackend::with_index(0);
        let guard = MaybeTestGuard::with_index(backend.clone(), 2).unwrap();
        assert_eq!(backend.writes(), 1);

        guard.reset().unwrap();
        assert_eq!(backend.index(), 0);

        // The restore happened once, in reset, and not again on drop
        assert_eq!(backend.writes(), 2);
        backend.force_index(5);
        assert_eq!(backend.index(), 5);
        assert_eq!(backend.writes(), 2);
    }

    #[test]
    fn test_reset_on_empty_guard_is_noop() {
        let backend = TestBackend::with_index(0);
        let guard = MaybeTestGuard::new(backend.clone());

        guard.reset().unwrap();
        assert_eq!(backend.reads(), 0);
        assert_eq!(backend.writes(), 0);
    }

    #[test]
    fn test_failed_reset_hands_guard_back() {
        let backend = TestBackend::with_index(0);
        let guard = MaybeTestGuard::with_index(backend.clone(), 2).unwrap();

        backend.fail_writes(true);
        let (guard, err) = guard.reset().unwrap_err();
        assert_eq!(
            err.into_backend(),
            Some(FakeBackendError::WriteRejected { device_type: DeviceType::Cuda, index: 0 })
        );
        assert!(guard.is_populated());
        assert_eq!(guard.original_device(), Some(dev(0)));
        assert_eq!(backend.index(), 2);

        backend.fail_writes(false);
        drop(guard);
        assert_eq!(backend.index(), 0);
    }
}
