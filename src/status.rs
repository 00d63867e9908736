//! Decoded driver status words.
//!
//! A raw [`ViStatus`] falls into one of four disjoint domains: success,
//! a documented warning, a parameter error (`WFS_ERROR_PARAMETER1..9`), or an
//! instrument/VISA error. Warnings are reported to callers as success with the
//! warning text attached.

use std::fmt;

use serde::Serialize;
use wfs_sys::ViStatus;

use crate::constants::{
    is_instrument_error, parameter_error, parameter_index, warning_message,
    CORRUPT_REF_FILE_MESSAGE, WFS_ERROR_CORRUPT_REF_FILE,
};

/// Message for a zero status.
pub const NO_ERRORS: &str = "No errors";

/// Domain a raw status code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusKind {
    Success,
    Warning,
    Parameter(u8),
    Instrument,
    Other,
}

impl StatusKind {
    pub fn classify(raw: ViStatus) -> Self {
        if raw == 0 {
            StatusKind::Success
        } else if warning_message(raw).is_some() {
            StatusKind::Warning
        } else if let Some(n) = parameter_index(raw) {
            StatusKind::Parameter(n)
        } else if is_instrument_error(raw) {
            StatusKind::Instrument
        } else {
            StatusKind::Other
        }
    }
}

/// Outcome of one driver call.
///
/// `code` is what the caller sees (0 for success and warnings); `raw` is what
/// the driver actually returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub code: ViStatus,
    pub raw: ViStatus,
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: 0,
            raw: 0,
            kind: StatusKind::Success,
            message: NO_ERRORS.to_string(),
        }
    }

    /// Status for a code that decodes without asking the driver, if any.
    pub fn local(raw: ViStatus) -> Option<Self> {
        match StatusKind::classify(raw) {
            StatusKind::Success => Some(Self::ok()),
            StatusKind::Warning => Some(Self {
                code: 0,
                raw,
                kind: StatusKind::Warning,
                message: warning_message(raw).unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }

    /// Host-side range rejection of the n-th parameter.
    pub fn parameter(n: u8) -> Self {
        let raw = parameter_error(n);
        Self {
            code: raw,
            raw,
            kind: StatusKind::Parameter(n),
            message: format!("Parameter {n} out of range!"),
        }
    }

    /// Error status with a message obtained from the driver.
    pub fn error(raw: ViStatus, message: impl Into<String>) -> Self {
        Self {
            code: raw,
            raw,
            kind: StatusKind::classify(raw),
            message: normalize_message(raw, message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub fn is_warning(&self) -> bool {
        self.kind == StatusKind::Warning
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw == self.code {
            write!(f, "{} ({})", self.message, self.code)
        } else {
            write!(f, "{} ({} -> {})", self.message, self.raw, self.code)
        }
    }
}

impl PartialEq<ViStatus> for Status {
    fn eq(&self, other: &ViStatus) -> bool {
        self.code == *other
    }
}

/// Fixes known defects in driver-supplied messages.
pub fn normalize_message(raw: ViStatus, message: String) -> String {
    if raw == WFS_ERROR_CORRUPT_REF_FILE {
        CORRUPT_REF_FILE_MESSAGE.to_string()
    } else {
        message.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    #[test]
    fn classify_domains() {
        assert_eq!(StatusKind::classify(0), StatusKind::Success);
        assert_eq!(StatusKind::classify(WFS_WARN_NSUP_ID_QUERY), StatusKind::Warning);
        assert_eq!(StatusKind::classify(WFS_ERROR_PARAMETER3), StatusKind::Parameter(3));
        assert_eq!(StatusKind::classify(WFS_ERROR_NO_PUPIL_DEFINED), StatusKind::Instrument);
        assert_eq!(StatusKind::classify(VI_ERROR + 1), StatusKind::Other);
    }

    #[test]
    fn warnings_decode_to_success() {
        for (code, message) in WFS_WARNING_CODES {
            let status = Status::local(*code).unwrap();
            assert_eq!(status.code, 0);
            assert_eq!(status.raw, *code);
            assert_eq!(status.message, *message);
            assert!(status.is_ok());
            assert!(status.is_warning());
        }
    }

    #[test]
    fn errors_need_the_driver() {
        assert!(Status::local(WFS_ERROR_INVALID_HANDLE).is_none());
        assert_eq!(Status::local(0), Some(Status::ok()));
    }

    #[test]
    fn corrupt_reference_message_is_normalized() {
        let status = Status::error(WFS_ERROR_CORRUPT_REF_FILE, "Corrupt refernce file!");
        assert_eq!(status.message, "Corrupt reference file!");
        assert_eq!(status, WFS_ERROR_CORRUPT_REF_FILE);
    }

    #[test]
    fn parameter_status_is_rendered_locally() {
        let status = Status::parameter(4);
        assert_eq!(status, WFS_ERROR_PARAMETER4);
        assert_eq!(status.message, "Parameter 4 out of range!");
        assert!(!status.is_ok());
    }
}
