//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed (an empty result set is still success)
//! - `2`: Blocking error - critical failure that should halt automation
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::{CorpusError, IndexError};

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// Query ran but matched nothing (code 3)
    NotFound = 3,

    /// Malformed record key or vector batch (code 4)
    InvalidInput = 4,

    /// Relational store unavailable or failing (code 5)
    StoreError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Index artifact missing, corrupt, or not loaded (code 7)
    IndexUnavailable = 7,

    /// Embedding model failed to load or run (code 8)
    EmbeddingError = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// `Success` for a non-empty result set, `NotFound` otherwise.
    pub fn from_matches<T>(matches: &[T]) -> Self {
        if matches.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Convert a `CorpusError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &CorpusError) -> Self {
        match error {
            CorpusError::Configuration { .. } => ExitCode::ConfigError,
            CorpusError::Key(e) if e.is_configuration() => ExitCode::ConfigError,
            CorpusError::Key(_) => ExitCode::InvalidInput,

            CorpusError::Index(e) => match e {
                IndexError::Configuration { .. } => ExitCode::ConfigError,
                IndexError::DimensionMismatch { .. }
                | IndexError::BatchLengthMismatch { .. }
                | IndexError::MalformedKey { .. }
                | IndexError::InvalidTopK { .. } => ExitCode::InvalidInput,
                IndexError::NotLoaded | IndexError::Load { .. } => ExitCode::IndexUnavailable,
                // A failed persist leaves no usable artifact behind
                IndexError::Persist { .. } => ExitCode::BlockingError,
            },

            CorpusError::Store(_) => ExitCode::StoreError,
            CorpusError::Embedding(_) => ExitCode::EmbeddingError,
        }
    }
}
