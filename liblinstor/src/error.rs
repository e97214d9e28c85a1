//! Error types for the LINSTOR translation layer.
//!
//! Every failure surfaced by `liblinstor` is a [`LinstorError`]. Translation
//! errors carry the offending value (and limits, where relevant) so callers
//! can build a precise diagnostic. Nothing in this crate retries; backend
//! failures are handed back exactly as the controller client reported them.

use thiserror::Error;

/// Unified error type for volume translation and orchestration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinstorError {
    /// No legal resource name could be derived from the input.
    #[error("could not derive a LINSTOR resource name from {name:?}: {reason}")]
    InvalidName {
        /// The rejected input.
        name: String,
        /// Which rule of the naming grammar it violates.
        reason: String,
    },

    /// The smallest volume LINSTOR can allocate is larger than the limit.
    #[error(
        "LINSTOR's minimum volume size of {minimum_bytes} bytes exceeds the limit of {limit_bytes} bytes"
    )]
    MinimumExceedsLimit {
        /// Minimum allocation in bytes.
        minimum_bytes: i64,
        /// Caller-supplied limit in bytes.
        limit_bytes: i64,
    },

    /// The rounded allocation does not fit within the requested limit.
    #[error(
        "got request for {required_bytes} bytes of storage (needed to allocate {allocated_kib} KiB), but size is limited to {limit_bytes} bytes"
    )]
    CapacityExceeded {
        /// Bytes the caller asked for.
        required_bytes: i64,
        /// Allocation after rounding up to whole KiB.
        allocated_kib: i64,
        /// Caller-supplied limit in bytes.
        limit_bytes: i64,
    },

    /// A volume parameter could not be interpreted.
    #[error("invalid value {value:?} for parameter {key}: {reason}")]
    InvalidParameter {
        /// Parameter key as supplied by the caller.
        key: String,
        /// Offending value.
        value: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A volume annotation was present but could not be decoded.
    #[error("corrupt volume annotation on resource definition {resource}: {reason}")]
    Codec {
        /// Backend resource definition carrying the annotation.
        resource: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The storage controller returned an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Formatting a device failed or was refused.
    #[error("format of {device} failed: {reason}")]
    Format {
        /// Device path.
        device: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A mount operation failed.
    #[error("mount failed at {path}: {reason}")]
    MountFailed {
        /// Filesystem path where the mount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// An unmount operation failed.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed {
        /// Filesystem path where the unmount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LinstorError {
    /// Create a [`LinstorError::Backend`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn backend<E: std::fmt::Display>(e: E) -> Self {
        Self::Backend(e.to_string())
    }

    /// Create a [`LinstorError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// The rounded allocation carried by a [`LinstorError::CapacityExceeded`].
    ///
    /// Lets callers report how much would have been allocated even though
    /// the request was rejected.
    pub fn allocated_kib(&self) -> Option<i64> {
        match self {
            Self::CapacityExceeded { allocated_kib, .. } => Some(*allocated_kib),
            _ => None,
        }
    }

    /// `true` for the two capacity failure kinds.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::MinimumExceedsLimit { .. } | Self::CapacityExceeded { .. }
        )
    }
}
