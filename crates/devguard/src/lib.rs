//! # Devguard
//!
//! Scoped **dev**ice **guard**s: switch the active compute device of a backend
//! for the duration of a scope, and switch it back when the scope ends, whether
//! it ends normally, through an early return, or by panicking.
//!
//! ## Overview
//!
//! Runtimes that support several kinds of accelerators usually keep a notion of
//! "the current device" per backend. Code that needs to run on a particular
//! device has to switch to it and, crucially, put the previous device back
//! afterwards so that callers are not surprised. This crate packages that
//! save-then-restore dance into RAII guards that nest correctly.
//!
//! ## Architecture
//!
//! ### Devices
//!
//! A [`Device`] is a ([`DeviceType`], [`DeviceIndex`]) pair. The index
//! [`CURRENT_DEVICE`] (`-1`) is accepted as input to mean "whichever device is
//! active"; guards resolve it and never hand it back.
//!
//! ### Backend Traits
//!
//! The [`DeviceBackend`] trait is the capability contract a backend fulfils:
//! report its device type, read the active index, write a new one. Guards are
//! written purely against this trait, so the same guard logic runs against a
//! real driver binding or an in-memory fake. [`DynBackend`] is its object-safe
//! counterpart.
//!
//! ### Guards
//!
//! - [`DeviceGuard`] always holds a device.
//! - [`MaybeDeviceGuard`] may be empty, and costs nothing until it is given a device.
//! - [`DynDeviceGuard`] works through a `&dyn DynBackend`.
//!
//! The only error a guard raises itself is [`GuardError::TypeMismatch`], when
//! handed a device of a different type than its backend manages. Backend errors
//! pass through untouched as [`GuardError::Backend`].
//!
//! ## Features
//!
//! - **fake** - Exposes [`backend::fake`], an in-memory backend for tests
//! - **candle** - Enables conversions from candle device locations
//!
//! ## Logging
//!
//! Guards emit [`tracing`] events: `trace` when capturing and restoring, `debug`
//! when switching devices or rejecting a device of the wrong type, and `error`
//! when a restore fails. No subscriber is installed by this crate.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::convert::Infallible;
//! use devguard::{Device, DeviceBackend, DeviceGuard, DeviceIndex, DeviceType, MaybeDeviceGuard};
//!
//! #[derive(Debug)]
//! struct Hip(Cell<DeviceIndex>);
//!
//! impl DeviceBackend for &Hip {
//!     const DEVICE_TYPE: DeviceType = DeviceType::Hip;
//!     type Error = Infallible;
//!
//!     fn current_index(&self) -> Result<DeviceIndex, Infallible> {
//!         Ok(self.0.get())
//!     }
//!
//!     fn set_current_index(&self, index: DeviceIndex) -> Result<(), Infallible> {
//!         self.0.set(index);
//!         Ok(())
//!     }
//! }
//!
//! let hip = Hip(Cell::new(0));
//! {
//!     let mut outer = DeviceGuard::new(&hip, 1).unwrap();
//!     {
//!         let mut inner = MaybeDeviceGuard::new(&hip);
//!         assert_eq!(inner.current_device(), None);
//!
//!         inner.set_index(2).unwrap();
//!         assert_eq!(inner.original_device(), Some(Device::new(DeviceType::Hip, 1)));
//!         assert_eq!(hip.0.get(), 2);
//!     }
//!     assert_eq!(hip.0.get(), 1);
//!
//!     // Devices of another backend type are rejected up front
//!     assert!(outer.set_device(Device::new(DeviceType::Cuda, 0)).is_err());
//! }
//! assert_eq!(hip.0.get(), 0);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

mod device;
mod error;

pub mod backend;
pub mod guard;

pub use backend::{BoxedBackendError, DeviceBackend, DynBackend};
pub use device::{CURRENT_DEVICE, Device, DeviceIndex, DeviceType, ParseDeviceError};
pub use error::GuardError;
pub use guard::{DeviceGuard, DynDeviceGuard, MaybeDeviceGuard};
