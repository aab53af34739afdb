//! Error handling for the hemi workspace.
//!
//! One enum covers the whole pipeline so that every layer can return
//! `HemiResult` without conversion boilerplate. Variants carry the context
//! a caller needs to decide between retrying, degrading and aborting.

use thiserror::Error;

/// Result type alias for hemi operations.
pub type HemiResult<T> = Result<T, HemiError>;

/// Errors produced by the acquisition, processing and logging layers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HemiError {
    /// Invalid configuration detected before the loop starts.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A filter cannot be designed from the requested parameters.
    #[error("filter design failed: {reason} (fs = {fs} Hz)")]
    FilterDesign {
        /// Description of the design error.
        reason: String,
        /// Sampling rate the design was attempted at.
        fs: f64,
    },

    /// The analysis window is too short to support the filter cascade.
    #[error("window of {samples} samples is below the filter support of {required}")]
    WindowTooShort {
        /// Samples available in the window.
        samples: usize,
        /// Minimum samples required by the cascade.
        required: usize,
    },

    /// No serial endpoint could be discovered or opened.
    #[error("no usable serial endpoint: {reason}")]
    EndpointUnavailable {
        /// Description of the discovery/open failure.
        reason: String,
    },

    /// The serial endpoint failed and reconnection attempts are exhausted.
    #[error("source disconnected after {attempts} reconnect attempts")]
    SourceExhausted {
        /// Reconnect attempts performed before giving up.
        attempts: u32,
    },

    /// I/O failure while talking to the serial endpoint.
    #[error("serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    /// A record sink failed; the scheduler disables it and continues.
    #[error("sink error: {reason}")]
    Sink {
        /// Description of the sink failure.
        reason: String,
    },

    /// A numeric invariant was violated inside the pipeline.
    #[error("internal numeric error: {reason}")]
    Internal {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl HemiError {
    /// True if the error terminates the run with a source failure
    /// (process exit code 1).
    pub fn is_fatal_source(&self) -> bool {
        matches!(
            self,
            HemiError::SourceExhausted { .. } | HemiError::EndpointUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = HemiError::WindowTooShort {
            samples: 100,
            required: 256,
        };
        let text = err.to_string();
        assert!(text.contains("100"));
        assert!(text.contains("256"));
    }

    #[test]
    fn fatal_source_classification() {
        assert!(HemiError::SourceExhausted { attempts: 5 }.is_fatal_source());
        assert!(!HemiError::Sink {
            reason: "disk full".into()
        }
        .is_fatal_source());
    }
}
