// src/error.rs

use crate::diag::Diagnostics;
use core::fmt;

/// Errors that can occur while compiling a document or handling an image.
#[derive(Debug)]
pub enum MbccbError {
    /// The document had at least one error. All diagnostics, warnings
    /// included, are attached.
    Rejected(Diagnostics),

    /// A value does not fit the binary field that must hold it.
    FieldOverflow { field: &'static str, value: usize },

    /// A buffer is too short to hold or decode a structure.
    BufferTooShort { needed: usize, actual: usize },

    /// An image does not start with the expected signature.
    BadSignature,
}

impl MbccbError {
    /// The diagnostics of a rejected document, if that is what this is.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            MbccbError::Rejected(diags) => Some(diags),
            _ => None,
        }
    }
}

impl From<Diagnostics> for MbccbError {
    fn from(diags: Diagnostics) -> Self {
        MbccbError::Rejected(diags)
    }
}

impl fmt::Display for MbccbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MbccbError::Rejected(diags) => write!(
                f,
                "Document rejected with {} error(s) and {} warning(s)",
                diags.error_count(),
                diags.warning_count()
            ),
            MbccbError::FieldOverflow { field, value } => {
                write!(f, "Value {} does not fit the '{}' field", value, field)
            }
            MbccbError::BufferTooShort { needed, actual } => write!(
                f,
                "Buffer too short: needed {} bytes, got {}",
                needed, actual
            ),
            MbccbError::BadSignature => write!(f, "Image signature mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MbccbError {}
