//! Error types for admission control and derivative generation.
//!
//! Admission errors are rejected synchronously before any store mutation.
//! Derivative errors are captured per variant and never abort sibling
//! derivatives or the containing batch.

use thiserror::Error;

/// Rejection reasons produced by pre-ingestion admission control.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("file too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: i64, max: i64 },

    #[error("unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("storage quota exceeded: {used} used + {requested} requested > {quota} quota")]
    QuotaExceeded {
        used: i64,
        requested: i64,
        quota: i64,
    },

    #[error("invalid content: {0}")]
    InvalidContent(String),
}

/// Failure of a single derivative-generation step.
///
/// `Unimplemented` is an explicit contract: strategies that have no codec
/// integration (video/audio compression, document preview) must fail with a
/// distinguishable error rather than silently degrading or skipping.
#[derive(Debug, Error)]
pub enum DerivativeError {
    #[error("{0} is not implemented")]
    Unimplemented(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("duration unknown: {0}")]
    UnknownDuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_error_messages_carry_limits() {
        let err = AdmissionError::FileTooLarge {
            size: 100,
            max: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));

        let err = AdmissionError::QuotaExceeded {
            used: 10,
            requested: 20,
            quota: 25,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("20"));
        assert!(msg.contains("25"));
    }

    #[test]
    fn unimplemented_is_distinguishable() {
        let err = DerivativeError::Unimplemented("document preview".to_string());
        assert!(err.to_string().contains("document preview"));
        assert!(err.to_string().contains("not implemented"));
    }
}
