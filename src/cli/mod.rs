//! CLI support for quarry
//!
//! Provides programmatic access to the quarry CLI functionality for
//! embedding in other tools.

mod codes;
mod normalize;

pub use codes::type_code_reference;
pub use normalize::{execute_normalize, NormalizeOptions};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Normalizer error (schema mismatch, malformed record, ...)
    Normalize(crate::normalize::NormalizeError),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Normalize(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No input provided. Pass an input file or pipe CSV to stdin.")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Normalize(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::normalize::NormalizeError> for CliError {
    fn from(e: crate::normalize::NormalizeError) -> Self {
        CliError::Normalize(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
