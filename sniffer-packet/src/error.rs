//! Header parsing errors

use thiserror::Error;

/// Why a header could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer bytes than the header requires
    #[error("{header} header needs {needed} bytes, have {available}")]
    Truncated {
        header: &'static str,
        needed: usize,
        available: usize,
    },

    /// Header fields are inconsistent
    #[error("{header} header malformed: {reason}")]
    Malformed {
        header: &'static str,
        reason: String,
    },
}

impl ParseError {
    pub(crate) fn truncated(header: &'static str, needed: usize, available: usize) -> Self {
        ParseError::Truncated {
            header,
            needed,
            available,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(header: &'static str, reason: S) -> Self {
        ParseError::Malformed {
            header,
            reason: reason.into(),
        }
    }
}
