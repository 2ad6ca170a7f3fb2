// src/backend/fake.rs

//! A fake backend that keeps its current index in memory.
//!
//! Every [`FakeBackend`] handle created with [`FakeBackend::with_index`] owns
//! fresh state, so tests never observe each other. Clones share state, which is
//! how a test keeps watching (and poking) a backend after handing a clone to a
//! guard.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicUsize, Ordering};

use super::DeviceBackend;
use crate::device::{DeviceIndex, DeviceType};

/// Fixes the [`DeviceType`] a [`FakeBackend`] reports.
pub trait FakeDeviceKind {
    /// The device type the fake backend manages
    const DEVICE_TYPE: DeviceType;
}

/// Marker for a fake CUDA backend.
#[derive(Debug)]
pub enum FakeCuda {}

/// Marker for a fake HIP backend.
#[derive(Debug)]
pub enum FakeHip {}

/// Marker for a fake Metal backend.
#[derive(Debug)]
pub enum FakeMetal {}

impl FakeDeviceKind for FakeCuda {
    const DEVICE_TYPE: DeviceType = DeviceType::Cuda;
}

impl FakeDeviceKind for FakeHip {
    const DEVICE_TYPE: DeviceType = DeviceType::Hip;
}

impl FakeDeviceKind for FakeMetal {
    const DEVICE_TYPE: DeviceType = DeviceType::Metal;
}

/// Error injected by [`FakeBackend::fail_writes`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FakeBackendError {
    #[error("fake {device_type} backend rejected write of index {index}")]
    WriteRejected { device_type: DeviceType, index: DeviceIndex },
}

#[derive(Debug, Default)]
struct FakeState {
    index: AtomicI8,
    reads: AtomicUsize,
    writes: AtomicUsize,
    reject_writes: AtomicBool,
}

/// In-memory [`DeviceBackend`] with observable reads and writes.
pub struct FakeBackend<K> {
    state: Arc<FakeState>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: FakeDeviceKind> FakeBackend<K> {
    /// Creates a backend whose current index starts at `index`.
    pub fn with_index(index: DeviceIndex) -> Self {
        let state = FakeState {
            index: AtomicI8::new(index),
            ..FakeState::default()
        };
        Self {
            state: Arc::new(state),
            _kind: PhantomData,
        }
    }

    /// The current index, read without counting as a backend read.
    pub fn index(&self) -> DeviceIndex {
        self.state.index.load(Ordering::SeqCst)
    }

    /// Overwrites the current index behind any guard's back.
    ///
    /// Not counted as a write.
    pub fn force_index(&self, index: DeviceIndex) {
        self.state.index.store(index, Ordering::SeqCst);
    }

    /// Number of [`DeviceBackend::current_index`] calls so far.
    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    /// Number of successful [`DeviceBackend::set_current_index`] calls so far.
    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    /// Makes every following write fail with [`FakeBackendError::WriteRejected`]
    /// until called again with `false`.
    pub fn fail_writes(&self, reject: bool) {
        self.state.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl<K: FakeDeviceKind> Default for FakeBackend<K> {
    fn default() -> Self {
        Self::with_index(0)
    }
}

impl<K> Clone for FakeBackend<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _kind: PhantomData,
        }
    }
}

impl<K: FakeDeviceKind> fmt::Debug for FakeBackend<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeBackend")
            .field("device_type", &K::DEVICE_TYPE)
            .field("index", &self.index())
            .field("reads", &self.reads())
            .field("writes", &self.writes())
            .finish()
    }
}

impl<K: FakeDeviceKind> DeviceBackend for FakeBackend<K> {
    const DEVICE_TYPE: DeviceType = K::DEVICE_TYPE;
    type Error = FakeBackendError;

    fn current_index(&self) -> Result<DeviceIndex, Self::Error> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.index())
    }

    fn set_current_index(&self, index: DeviceIndex) -> Result<(), Self::Error> {
        if self.state.reject_writes.load(Ordering::SeqCst) {
            return Err(FakeBackendError::WriteRejected {
                device_type: K::DEVICE_TYPE,
                index,
            });
        }
        self.state.index.store(index, Ordering::SeqCst);
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let backend = FakeBackend::<FakeCuda>::with_index(0);
        let other = backend.clone();

        DeviceBackend::set_current_index(&other, 5).unwrap();
        assert_eq!(backend.index(), 5);
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn test_fresh_backends_are_independent() {
        let a = FakeBackend::<FakeCuda>::with_index(0);
        let b = FakeBackend::<FakeCuda>::with_index(0);

        a.force_index(3);
        assert_eq!(a.index(), 3);
        assert_eq!(b.index(), 0);
    }

    #[test]
    fn test_counts_reads_and_writes() {
        let backend = FakeBackend::<FakeMetal>::default();

        assert_eq!(DeviceBackend::exchange_index(&backend, 2).unwrap(), 0);
        assert_eq!(backend.reads(), 1);
        assert_eq!(backend.writes(), 1);

        // Out-of-band writes are invisible to the counters
        backend.force_index(4);
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn test_rejected_write_leaves_index() {
        let backend = FakeBackend::<FakeCuda>::with_index(1);
        backend.fail_writes(true);

        let err = DeviceBackend::set_current_index(&backend, 2).unwrap_err();
        assert_eq!(
            err,
            FakeBackendError::WriteRejected { device_type: DeviceType::Cuda, index: 2 }
        );
        assert_eq!(backend.index(), 1);
        assert_eq!(backend.writes(), 0);

        backend.fail_writes(false);
        DeviceBackend::set_current_index(&backend, 2).unwrap();
        assert_eq!(backend.index(), 2);
    }

    #[test]
    fn test_reports_kind_device_type() {
        assert_eq!(DeviceBackend::device_type(&FakeBackend::<FakeCuda>::default()), DeviceType::Cuda);
        assert_eq!(DeviceBackend::device_type(&FakeBackend::<FakeHip>::default()), DeviceType::Hip);
        assert_eq!(<FakeBackend<FakeMetal> as DeviceBackend>::DEVICE_TYPE, DeviceType::Metal);
    }
}
