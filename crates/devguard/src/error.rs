//! # Guard Errors
//!
//! Guards raise exactly one error of their own: a [`GuardError::TypeMismatch`],
//! when a caller hands a guard a [`Device`] belonging to a different backend
//! type than the one it is bound to. The check runs before any backend call,
//! so a rejected operation leaves both the guard and the backend untouched.
//!
//! Anything a backend reports is carried through [`GuardError::Backend`] as-is.

use crate::device::{Device, DeviceType};

/// Error returned by guard constructors and setters.
///
/// `E` is the error type of the backend the guard is bound to.
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    /// The supplied device belongs to a different backend type.
    #[error("device type mismatch: guard is bound to {expected}, got {actual}")]
    TypeMismatch {
        /// The type the guard is bound to.
        expected: DeviceType,
        /// The rejected device.
        actual: Device,
    },
    /// The backend failed to read or write its current index.
    #[error(transparent)]
    Backend(E),
}

impl<E> GuardError<E> {
    /// Whether this is a [`GuardError::TypeMismatch`].
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, GuardError::TypeMismatch { .. })
    }

    /// The backend error, if this error came from the backend.
    pub fn into_backend(self) -> Option<E> {
        match self {
            GuardError::Backend(err) => Some(err),
            GuardError::TypeMismatch { .. } => None,
        }
    }
}
