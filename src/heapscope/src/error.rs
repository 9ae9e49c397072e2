//! Decoder error taxonomy
//!
//! Every decoding call returns [`Result`]. "Absent" values are `Ok(None)`,
//! never an error variant.

use crate::source::Fault;
use thiserror::Error;

/// Errors produced while decoding a target image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Memory at the requested range is not in the image
    #[error(transparent)]
    Fault(#[from] Fault),

    /// A read succeeded but the value violates a structural invariant
    #[error("corrupt {what} at {address:#x}: expected {expected}, found {actual}")]
    Corrupt {
        what: &'static str,
        address: u64,
        expected: String,
        actual: String,
    },

    /// An element range falls outside the decoded array size
    #[error("range [{start}, {start}+{length}) exceeds size {size} of array at {address:#x}")]
    OutOfBounds {
        address: u64,
        start: u64,
        length: u64,
        size: u64,
    },

    /// The capability does not exist for the resolved profile
    #[error("{capability} is not supported by this build")]
    Unsupported { capability: &'static str },

    /// An algorithm-version name the session was never given
    #[error("unknown algorithm version {0:?}")]
    UnknownVersion(String),

    /// The caller-supplied profile is internally inconsistent
    #[error("invalid session profile: {0}")]
    InvalidProfile(String),
}

impl DecodeError {
    pub(crate) fn corrupt(
        what: &'static str,
        address: u64,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::Corrupt {
            what,
            address,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for errors that mean the image itself is damaged or unreadable
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::Fault(_) | Self::Corrupt { .. } | Self::OutOfBounds { .. }
        )
    }
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
