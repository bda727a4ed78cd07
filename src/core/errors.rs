//! Error types for the bordereau reading pipeline.
//!
//! All pipeline failures funnel into [`ReadError`], a tagged-variant enum
//! with one variant per error family. Each variant carries a human-readable
//! message and, where one exists, the underlying cause as a boxed `#[source]`
//! error so root-cause diagnostics survive without leaking internal types.

use thiserror::Error;

/// Convenience alias for results produced by the reading pipeline.
pub type ReadResult<T> = Result<T, ReadError>;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while reading a bordereau.
///
/// Detection, orientation and rectification errors indicate genuinely
/// unreadable input and are never retried automatically; they surface
/// per page with enough context (page index, corners found) for manual
/// review. Only engine-level recognition failures are page-fatal; a
/// single region reading wrong is a recorded failure, not an error.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The source document is unsupported or unreadable.
    #[error("document source: {message}")]
    DocumentSource {
        /// A message describing what made the source unusable.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Cause>,
    },

    /// No usable calibration targets were found on the page.
    #[error("target detection: {message}")]
    TargetDetection {
        /// A message describing the detection failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Cause>,
    },

    /// The page orientation is indeterminate or an unsupported
    /// transform was requested.
    #[error("alignment: {message}")]
    Alignment {
        /// A message describing the alignment problem.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Cause>,
    },

    /// Too few anchor correspondences to rectify the page.
    #[error("realignment: {message}")]
    Realignment {
        /// A message describing the correspondence shortfall.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Cause>,
    },

    /// A recognition engine failed at the engine level (missing weights,
    /// failed initialization). Page-fatal.
    #[error("recognition: {message}")]
    Recognition {
        /// A message describing the engine failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Cause>,
    },
}

impl ReadError {
    /// Creates a [`ReadError::DocumentSource`] without a cause.
    pub fn document_source(message: impl Into<String>) -> Self {
        Self::DocumentSource {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ReadError::DocumentSource`] wrapping a cause.
    pub fn document_source_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DocumentSource {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a [`ReadError::TargetDetection`] without a cause.
    pub fn target_detection(message: impl Into<String>) -> Self {
        Self::TargetDetection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ReadError::Alignment`] without a cause.
    pub fn alignment(message: impl Into<String>) -> Self {
        Self::Alignment {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ReadError::Realignment`] without a cause.
    pub fn realignment(message: impl Into<String>) -> Self {
        Self::Realignment {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ReadError::Recognition`] without a cause.
    pub fn recognition(message: impl Into<String>) -> Self {
        Self::Recognition {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`ReadError::Recognition`] wrapping a cause.
    pub fn recognition_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Recognition {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display_includes_family_and_message() {
        let err = ReadError::realignment("insufficient anchor points (3 required, 2 found)");
        assert_eq!(
            err.to_string(),
            "realignment: insufficient anchor points (3 required, 2 found)"
        );
    }

    #[test]
    fn test_wrapped_cause_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "model.onnx");
        let err = ReadError::recognition_with("classifier weights missing", io);
        let source = err.source().expect("cause should be preserved");
        assert!(source.to_string().contains("model.onnx"));
    }

    #[test]
    fn test_errors_without_cause_have_no_source() {
        let err = ReadError::alignment("rotation must be a multiple of 90 degrees");
        assert!(err.source().is_none());
    }
}
