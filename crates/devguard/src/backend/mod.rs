//! # Device Backends
//!
//! This module defines the capability contract a device backend must provide for
//! guards to drive it, independent of how the backend actually switches devices.
//!
//! ## Contracts
//!
//! - [`DeviceBackend`]: the statically typed contract. The backend's
//!   [`DeviceType`](crate::DeviceType) is an associated constant, so a guard
//!   generic over the backend is bound to that type at compile time.
//! - [`DynBackend`]: the object-safe sibling used when the backend is only known
//!   at run time. Every [`DeviceBackend`] is a [`DynBackend`].
//!
//! ## Feature Flags
//!
//! - `fake`: exposes [`fake`], an in-memory backend for testing guard logic
//! - `candle`: enables conversions between [`Device`](crate::Device) and
//!   `candle_core`'s device locations
//!
//! The "current index" always belongs to the backend. Guards only read it,
//! write it, and put it back.

mod core_trait;
mod dynamic;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle device interop.
///
/// This module is only available when the `candle` feature flag is enabled.
/// It maps candle's device locations onto [`Device`](crate::Device) values so
/// that tensors' devices can be handed straight to a guard.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "fake")))]
#[cfg(any(test, feature = "fake"))]
/// In-memory fake backend.
///
/// Keeps its current index in shared atomics and counts reads and writes, so
/// tests can assert exactly how a guard drove the backend.
pub mod fake;

pub use core_trait::*;
pub use dynamic::*;
