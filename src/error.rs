//! Custom error types for the toolkit.
//!
//! This module defines the primary error type, `DaqError`, used across the
//! crate. Using the `thiserror` crate, it provides a centralized way to
//! handle the kinds of failures the toolkit encounters: vendor-driver
//! errors (carried as LJM error codes), argument-shape problems in the
//! register and stream helpers, and configuration/file I/O issues.
//!
//! The vendor driver reports every failure as a numeric error code. The
//! two codes the toolkit deliberately tolerates during cleanup
//! (`LJME_DEVICE_NOT_OPEN` on close, `STREAM_NOT_RUNNING` on stream stop)
//! are recognised through [`DaqError::is_device_not_open`] and
//! [`DaqError::is_stream_not_running`] rather than by matching on message
//! strings.

use thiserror::Error;

/// Convenience alias for results using the toolkit error type.
pub type Result<T> = std::result::Result<T, DaqError>;

/// Errors produced by the LabJack DAQ toolkit.
#[derive(Error, Debug)]
pub enum DaqError {
    /// An LJM call returned a nonzero error code.
    #[error("LJM error {code}: {name}")]
    Ljm {
        /// Vendor error code, see the LJM error list.
        code: i32,
        /// Vendor error name (from `LJM_ErrorToString`).
        name: String,
    },

    /// Number of supplied values does not match the configured register
    /// or stream-out target count.
    #[error("got {provided} values for {expected} registers")]
    LengthMismatch {
        /// Number of registers or targets configured.
        expected: usize,
        /// Number of values supplied.
        provided: usize,
    },

    /// A waveform does not fit the fixed-size stream-out buffer.
    #[error("waveform of {samples} samples exceeds the stream-out buffer ({max} samples)")]
    WaveformTooLong {
        /// Samples in the rejected waveform.
        samples: usize,
        /// Maximum samples the buffer holds in the chosen format.
        max: usize,
    },

    /// `start` was called before any waveform was loaded.
    #[error("no waveform loaded into the stream-out buffers")]
    NothingLoaded,

    /// Interval period cannot be represented in whole microseconds
    /// acceptable to the vendor driver.
    #[error("interval period {0:?} is out of range")]
    InvalidPeriod(std::time::Duration),

    /// Configuration file or environment parsing error.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Semantic configuration error caught during validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or terminal I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DaqError {
    /// Vendor error code, if this is an LJM error.
    pub fn ljm_code(&self) -> Option<i32> {
        match self {
            DaqError::Ljm { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for `LJME_DEVICE_NOT_OPEN`, tolerated when closing a device
    /// that is already gone.
    pub fn is_device_not_open(&self) -> bool {
        self.ljm_code() == Some(ljm_sys::LJME_DEVICE_NOT_OPEN)
    }

    /// True for the device's `STREAM_NOT_RUNNING` error, tolerated when
    /// stopping a stream that never started or already finished.
    pub fn is_stream_not_running(&self) -> bool {
        self.ljm_code() == Some(ljm_sys::LJME_STREAM_NOT_RUNNING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_device_not_open() {
        let err = DaqError::Ljm {
            code: ljm_sys::LJME_DEVICE_NOT_OPEN,
            name: "LJME_DEVICE_NOT_OPEN".into(),
        };
        assert!(err.is_device_not_open());
        assert!(!err.is_stream_not_running());
    }

    #[test]
    fn non_ljm_errors_have_no_code() {
        let err = DaqError::NothingLoaded;
        assert_eq!(err.ljm_code(), None);
        assert!(!err.is_device_not_open());
    }

    #[test]
    fn length_mismatch_message_names_both_counts() {
        let err = DaqError::LengthMismatch {
            expected: 2,
            provided: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('2') && msg.contains('3'));
    }
}
