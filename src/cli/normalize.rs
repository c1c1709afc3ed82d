//! Run the CSV normalizer from the command line

use std::io;
use std::path::PathBuf;

use super::CliError;
use crate::normalize::{parse_type_codes, Normalizer, Summary};

/// Options for the normalize command
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Source CSV file; `None` reads from stdin
    pub input: Option<PathBuf>,
    /// Destination file
    pub output: PathBuf,
    /// Single-character type codes, one per column (e.g. "icc")
    pub types: String,
    /// Input delimiter; defaults to a comma
    pub delimiter: Option<char>,
}

/// Execute a normalize operation
pub fn execute_normalize(options: &NormalizeOptions) -> Result<Summary, CliError> {
    let types = parse_type_codes(&options.types)?;

    let mut normalizer = Normalizer::new();
    if let Some(delim) = options.delimiter {
        normalizer = normalizer.with_delimiter(delim as u8);
    }

    let summary = match &options.input {
        Some(path) => normalizer.normalize(path, &options.output, &types)?,
        None => normalizer.normalize_reader(io::stdin().lock(), &options.output, &types)?,
    };
    Ok(summary)
}
