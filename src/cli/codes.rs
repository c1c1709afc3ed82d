//! Type-code reference text for the `codes` subcommand

/// The column type-code reference shown by `quarry codes`.
pub fn type_code_reference() -> String {
    r#"Column type codes

Each column of the input file gets one single-character code. The codes
decide how the normalizer rewrites that column for bulk loading:

  i   integer     validated, emitted unquoted
  c   character   line breaks collapsed to spaces, always double-quoted,
                  interior quotes doubled
  d   double      validated, emitted unquoted
  l   logical     accepts true/false, TRUE/FALSE, T/F, 1/0;
                  emitted as true/false
  t   timestamp   accepts RFC 3339, "YYYY-MM-DD HH:MM:SS",
                  "MM/DD/YYYY HH:MM:SS", or a bare date;
                  emitted as YYYY-MM-DDTHH:MM:SS

The code string must have exactly one code per column:

  quarry normalize --types icc raw.csv clean.csv

Empty non-text fields pass through empty (NULL on load).
"#
    .to_string()
}
