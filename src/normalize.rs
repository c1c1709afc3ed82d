//! CSV normalization for warehouse bulk loads.
//!
//! A raw export often carries embedded line breaks inside quoted text fields
//! and inconsistent timestamp formats, both of which trip up load jobs. The
//! normalizer makes one streaming pass over the source file and writes a
//! re-quoted, type-stable copy:
//!
//! - text fields have every embedded line break collapsed to a single space
//!   and are always double-quoted, interior quotes doubled per RFC 4180;
//! - timestamps are re-rendered in one fixed ISO-8601 shape;
//! - integer, double, and logical fields are validated and emitted unquoted.
//!
//! The caller declares one single-character type code per column (the readr
//! short codes: `i` integer, `c` character, `d` double, `l` logical, `t`
//! timestamp). A code-count/column-count mismatch is fatal before any data
//! row is read.
//!
//! Output goes to a temporary file in the destination directory and is
//! renamed onto the destination only on success, so a failed run never
//! leaves a half-written file behind. Memory use is bounded by one record,
//! not by file size.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;

/// Per-column type, decoded from a single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `i` — integer, emitted unquoted
    Integer,
    /// `c` — character/free text, scrubbed and always quoted
    Text,
    /// `d` — double, emitted unquoted
    Double,
    /// `l` — logical, normalized to `true`/`false`
    Logical,
    /// `t` — timestamp, re-rendered as `YYYY-MM-DDTHH:MM:SS`
    Timestamp,
}

impl ColumnType {
    /// Decode one type code. Returns `None` for anything outside the
    /// alphabet.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(ColumnType::Integer),
            'c' => Some(ColumnType::Text),
            'd' => Some(ColumnType::Double),
            'l' => Some(ColumnType::Logical),
            't' | 'T' => Some(ColumnType::Timestamp),
            _ => None,
        }
    }
}

/// Decode a whole code string, e.g. `"icc"` for an integer column followed
/// by two text columns.
pub fn parse_type_codes(codes: &str) -> Result<Vec<ColumnType>, NormalizeError> {
    codes
        .chars()
        .map(|c| ColumnType::from_code(c).ok_or(NormalizeError::UnknownTypeCode(c)))
        .collect()
}

/// Errors raised by the normalizer. All are fatal and reported immediately;
/// bad input data is never auto-repaired.
#[derive(Debug)]
pub enum NormalizeError {
    /// Declared type-code count does not match the header's column count.
    /// Raised before any data row is read.
    SchemaMismatch { columns: usize, codes: usize },

    /// A type code outside the `icdlt` alphabet
    UnknownTypeCode(char),

    /// A data row with the wrong field count, or a non-text value that does
    /// not parse as its declared type
    MalformedRecord { line: u64, reason: String },

    /// Filesystem error
    Io(io::Error),

    /// Low-level CSV reader error
    Csv(csv::Error),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::SchemaMismatch { columns, codes } => write!(
                f,
                "Schema mismatch: header has {} columns but {} type codes were declared",
                columns, codes
            ),
            NormalizeError::UnknownTypeCode(c) => {
                write!(f, "Unknown type code: '{}' (expected one of i, c, d, l, t)", c)
            }
            NormalizeError::MalformedRecord { line, reason } => {
                write!(f, "Malformed record at line {}: {}", line, reason)
            }
            NormalizeError::Io(e) => write!(f, "IO error: {}", e),
            NormalizeError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl std::error::Error for NormalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NormalizeError::Io(e) => Some(e),
            NormalizeError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NormalizeError {
    fn from(e: io::Error) -> Self {
        NormalizeError::Io(e)
    }
}

impl From<csv::Error> for NormalizeError {
    fn from(e: csv::Error) -> Self {
        NormalizeError::Csv(e)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Data rows written (header excluded)
    pub rows: u64,
    /// Columns per row
    pub columns: usize,
}

/// The CSV normalizer. Configure with the builder methods, then call
/// [`normalize`](Normalizer::normalize).
///
/// # Examples
///
/// ```no_run
/// use quarry::normalize::{parse_type_codes, Normalizer};
/// use std::path::Path;
///
/// let types = parse_type_codes("icc").unwrap();
/// let summary = Normalizer::new()
///     .normalize(Path::new("raw.csv"), Path::new("clean.csv"), &types)
///     .unwrap();
/// println!("wrote {} rows", summary.rows);
/// ```
pub struct Normalizer {
    /// Input delimiter (output is always comma-separated)
    delimiter: u8,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer { delimiter: b',' }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input delimiter (the output always uses commas).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Rewrite `source` into `dest`, applying the per-column transformations.
    ///
    /// Streams record by record; the source file is never modified. The
    /// output appears at `dest` only if the whole pass succeeds, and
    /// re-running on the same input produces byte-identical output.
    pub fn normalize(
        &self,
        source: &Path,
        dest: &Path,
        types: &[ColumnType],
    ) -> Result<Summary, NormalizeError> {
        let file = File::open(source)?;
        let summary = self.normalize_reader(file, dest, types)?;
        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            rows = summary.rows,
            "normalized CSV"
        );
        Ok(summary)
    }

    /// Same as [`normalize`](Normalizer::normalize) but over any reader,
    /// e.g. stdin.
    pub fn normalize_reader<R: io::Read>(
        &self,
        source: R,
        dest: &Path,
        types: &[ColumnType],
    ) -> Result<Summary, NormalizeError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            // Flexible so short/long rows reach our own MalformedRecord
            // instead of a reader error.
            .flexible(true)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        if headers.len() != types.len() {
            return Err(NormalizeError::SchemaMismatch {
                columns: headers.len(),
                codes: types.len(),
            });
        }

        let file_name = dest
            .file_name()
            .ok_or_else(|| {
                NormalizeError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "destination has no file name",
                ))
            })?
            .to_string_lossy()
            .into_owned();
        let tmp = dest.with_file_name(format!("{}.tmp", file_name));

        let result = self.write_normalized(&mut reader, &headers, types, &tmp);
        match result {
            Ok(rows) => {
                fs::rename(&tmp, dest)?;
                Ok(Summary {
                    rows,
                    columns: types.len(),
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e)
            }
        }
    }

    fn write_normalized<R: io::Read>(
        &self,
        reader: &mut csv::Reader<R>,
        headers: &csv::StringRecord,
        types: &[ColumnType],
        tmp: &Path,
    ) -> Result<u64, NormalizeError> {
        let mut writer = BufWriter::new(File::create(tmp)?);

        let header_line: Vec<String> = headers.iter().map(quote_if_needed).collect();
        writeln!(writer, "{}", header_line.join(","))?;

        let mut rows = 0u64;
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() != types.len() {
                return Err(NormalizeError::MalformedRecord {
                    line,
                    reason: format!(
                        "expected {} fields, found {}",
                        types.len(),
                        record.len()
                    ),
                });
            }

            let mut fields = Vec::with_capacity(types.len());
            for (value, ty) in record.iter().zip(types) {
                fields.push(normalize_field(*ty, value, line)?);
            }
            writeln!(writer, "{}", fields.join(","))?;
            rows += 1;
        }

        writer.flush()?;
        Ok(rows)
    }
}

/// Normalize one field according to its declared type.
fn normalize_field(ty: ColumnType, raw: &str, line: u64) -> Result<String, NormalizeError> {
    let malformed = |reason: String| NormalizeError::MalformedRecord { line, reason };

    match ty {
        ColumnType::Text => {
            let scrubbed = scrub_line_breaks(raw);
            Ok(format!("\"{}\"", scrubbed.replace('"', "\"\"")))
        }
        ColumnType::Integer => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(String::new());
            }
            trimmed
                .parse::<i64>()
                .map_err(|_| malformed(format!("'{}' is not an integer", trimmed)))?;
            Ok(trimmed.to_string())
        }
        ColumnType::Double => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(String::new());
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| malformed(format!("'{}' is not a number", trimmed)))?;
            Ok(trimmed.to_string())
        }
        ColumnType::Logical => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(String::new());
            }
            match trimmed {
                "true" | "TRUE" | "True" | "T" | "1" => Ok("true".to_string()),
                "false" | "FALSE" | "False" | "F" | "0" => Ok("false".to_string()),
                other => Err(malformed(format!("'{}' is not a logical value", other))),
            }
        }
        ColumnType::Timestamp => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(String::new());
            }
            let ts = parse_timestamp(trimmed)
                .ok_or_else(|| malformed(format!("'{}' is not a timestamp", trimmed)))?;
            Ok(ts.format("%Y-%m-%dT%H:%M:%S").to_string())
        }
    }
}

/// Replace every embedded line break (CRLF, LF, or CR) with a single space.
fn scrub_line_breaks(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Accept the common timestamp shapes seen in raw exports.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Quote a header name only when it would otherwise break the row.
fn quote_if_needed(name: &str) -> String {
    if name.contains(',') || name.contains('"') || name.contains('\n') || name.contains('\r') {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_full_alphabet() {
        let types = parse_type_codes("icdlt").unwrap();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Double,
                ColumnType::Logical,
                ColumnType::Timestamp,
            ]
        );
    }

    #[test]
    fn rejects_unknown_code() {
        let err = parse_type_codes("icx").unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownTypeCode('x')));
    }

    #[test]
    fn text_fields_are_scrubbed_and_quoted() {
        let out = normalize_field(ColumnType::Text, "line1\nline2", 2).unwrap();
        assert_eq!(out, "\"line1 line2\"");

        let out = normalize_field(ColumnType::Text, "a \"quoted\" word", 2).unwrap();
        assert_eq!(out, "\"a \"\"quoted\"\" word\"");
    }

    #[test]
    fn crlf_collapses_to_one_space() {
        let out = normalize_field(ColumnType::Text, "a\r\nb", 2).unwrap();
        assert_eq!(out, "\"a b\"");
    }

    #[test]
    fn logical_values_are_normalized() {
        assert_eq!(normalize_field(ColumnType::Logical, "TRUE", 2).unwrap(), "true");
        assert_eq!(normalize_field(ColumnType::Logical, "F", 2).unwrap(), "false");
        assert!(normalize_field(ColumnType::Logical, "maybe", 2).is_err());
    }

    #[test]
    fn timestamps_render_in_one_fixed_shape() {
        for input in [
            "2024-03-01T09:30:00Z",
            "2024-03-01 09:30:00",
            "03/01/2024 09:30:00",
        ] {
            let out = normalize_field(ColumnType::Timestamp, input, 2).unwrap();
            assert_eq!(out, "2024-03-01T09:30:00", "input: {}", input);
        }
        let out = normalize_field(ColumnType::Timestamp, "2024-03-01", 2).unwrap();
        assert_eq!(out, "2024-03-01T00:00:00");
    }

    #[test]
    fn garbage_numerics_are_malformed() {
        let err = normalize_field(ColumnType::Integer, "12.5", 7).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedRecord { line: 7, .. }));
        assert!(normalize_field(ColumnType::Double, "abc", 3).is_err());
    }

    #[test]
    fn empty_non_text_fields_pass_through_empty() {
        assert_eq!(normalize_field(ColumnType::Integer, "", 2).unwrap(), "");
        assert_eq!(normalize_field(ColumnType::Timestamp, "  ", 2).unwrap(), "");
    }
}
