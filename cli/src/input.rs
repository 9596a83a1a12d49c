//! Pairs specification parser.
//!
//! One `--pairs` argument accepts three source forms, recognized by
//! prefix/suffix rather than a formal grammar:
//!
//! - inline list: `"BTC/USD,ETH/USD"` (split on commas, trimmed)
//! - CSV column: `path.csv:column[:limit]` (exact header match)
//! - text file: `path.txt[:limit]` (one symbol per line, `#` comments)
//!
//! Whatever the source, the result is a non-empty ordered symbol list;
//! anything else is an [`FeedError::InputSpec`] with a diagnostic.

use common::FeedError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Which form the specification took, kept for startup logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairsSource {
    /// Comma-separated inline list
    Inline,
    /// `path.csv:column[:limit]`
    CsvFile {
        /// CSV path
        path: String,
        /// Column matched against the header
        column: String,
        /// Row limit; `None` means all rows
        limit: Option<usize>,
    },
    /// `path.txt[:limit]`
    TextFile {
        /// Text file path
        path: String,
        /// Line limit; `None` means all lines
        limit: Option<usize>,
    },
}

/// A materialized symbol list plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPairs {
    /// Ordered, deduplication-free symbol list (never empty)
    pub symbols: Vec<String>,
    /// Where the symbols came from
    pub source: PairsSource,
}

/// Parse a `--pairs` specification into a symbol list
pub fn parse_pairs_spec(spec: &str) -> Result<ParsedPairs, FeedError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(FeedError::InputSpec("empty specification".into()));
    }

    if !looks_like_path(spec) {
        return parse_inline(spec);
    }

    let (path, remainder) = match spec.find(':') {
        Some(pos) => (&spec[..pos], Some(&spec[pos + 1..])),
        None => (spec, None),
    };

    if path.to_ascii_lowercase().ends_with(".txt") {
        let limit = match remainder {
            Some(s) => Some(parse_limit(s)?),
            None => None,
        };
        return parse_text_file(path, effective_limit(limit));
    }

    if path.to_ascii_lowercase().ends_with(".csv") {
        let Some(remainder) = remainder else {
            return Err(FeedError::InputSpec(format!(
                "CSV form requires a column: {path}:column[:limit]"
            )));
        };
        let (column, limit) = match remainder.find(':') {
            Some(pos) => (
                &remainder[..pos],
                Some(parse_limit(&remainder[pos + 1..])?),
            ),
            None => (remainder, None),
        };
        if column.is_empty() {
            return Err(FeedError::InputSpec(format!(
                "CSV form requires a column: {path}:column[:limit]"
            )));
        }
        return parse_csv_column(path, column, effective_limit(limit));
    }

    Err(FeedError::InputSpec(format!(
        "unrecognized form: {spec} (expected an inline list, a .csv:column spec, or a .txt file)"
    )))
}

/// A spec is a file reference when it carries a known extension or an
/// explicit path prefix; a bare comma-separated list is symbols.
fn looks_like_path(spec: &str) -> bool {
    let lower = spec.to_ascii_lowercase();
    lower.contains(".csv")
        || lower.contains(".txt")
        || spec.starts_with('/')
        || spec.starts_with("./")
        || spec.starts_with("../")
}

fn parse_limit(s: &str) -> Result<i64, FeedError> {
    s.parse::<i64>()
        .map_err(|_| FeedError::InputSpec(format!("invalid limit: {s}")))
}

/// Negative or omitted limits mean "all"
fn effective_limit(limit: Option<i64>) -> Option<usize> {
    match limit {
        Some(n) if n >= 0 => Some(n as usize),
        _ => None,
    }
}

fn parse_inline(spec: &str) -> Result<ParsedPairs, FeedError> {
    let symbols: Vec<String> = spec
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if symbols.is_empty() {
        return Err(FeedError::InputSpec("no symbols in list".into()));
    }
    Ok(ParsedPairs {
        symbols,
        source: PairsSource::Inline,
    })
}

fn parse_text_file(path: &str, limit: Option<usize>) -> Result<ParsedPairs, FeedError> {
    let file = open_listed(path)?;
    let mut symbols = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| FeedError::InputSpec(format!("cannot read {path}: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        symbols.push(trimmed.to_string());
        if limit.is_some_and(|n| symbols.len() >= n) {
            break;
        }
    }
    if symbols.is_empty() {
        return Err(FeedError::InputSpec(format!(
            "no symbols extracted from {path}"
        )));
    }
    Ok(ParsedPairs {
        symbols,
        source: PairsSource::TextFile {
            path: path.to_string(),
            limit,
        },
    })
}

fn parse_csv_column(path: &str, column: &str, limit: Option<usize>) -> Result<ParsedPairs, FeedError> {
    let file = open_listed(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| FeedError::InputSpec(format!("cannot read CSV header of {path}: {e}")))?
        .clone();
    let Some(index) = headers.iter().position(|h| h == column) else {
        let available: Vec<&str> = headers.iter().collect();
        return Err(FeedError::InputSpec(format!(
            "column '{column}' not found in {path}; available columns: {}",
            available.join(", ")
        )));
    };

    let mut symbols = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| FeedError::InputSpec(format!("cannot read {path}: {e}")))?;
        let Some(value) = row.get(index) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        symbols.push(value.to_string());
        if limit.is_some_and(|n| symbols.len() >= n) {
            break;
        }
    }
    if symbols.is_empty() {
        return Err(FeedError::InputSpec(format!(
            "no symbols extracted from {path}:{column}"
        )));
    }
    Ok(ParsedPairs {
        symbols,
        source: PairsSource::CsvFile {
            path: path.to_string(),
            column: column.to_string(),
            limit,
        },
    })
}

fn open_listed(path: &str) -> Result<File, FeedError> {
    if !Path::new(path).is_file() {
        return Err(FeedError::InputSpec(format!("file does not exist: {path}")));
    }
    File::open(path).map_err(|e| FeedError::InputSpec(format!("cannot open {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn inline_list() {
        let parsed = parse_pairs_spec("BTC/USD,ETH/USD").unwrap();
        assert_eq!(parsed.symbols, vec!["BTC/USD", "ETH/USD"]);
        assert_eq!(parsed.source, PairsSource::Inline);
    }

    #[test]
    fn inline_list_trims_and_drops_empties() {
        let parsed = parse_pairs_spec(" BTC/USD , ,ETH/USD, ").unwrap();
        assert_eq!(parsed.symbols, vec!["BTC/USD", "ETH/USD"]);
    }

    #[test]
    fn single_symbol_is_inline() {
        let parsed = parse_pairs_spec("BTC/USD").unwrap();
        assert_eq!(parsed.symbols, vec!["BTC/USD"]);
    }

    #[test]
    fn csv_column_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "pairs.csv", "name,symbol,vol\nfoo,AAA,1\nbar,BBB,2\nbaz,CCC,3\n");

        let parsed = parse_pairs_spec(&format!("{path}:symbol:2")).unwrap();
        assert_eq!(parsed.symbols, vec!["AAA", "BBB"]);
        assert_eq!(
            parsed.source,
            PairsSource::CsvFile {
                path: path.clone(),
                column: "symbol".into(),
                limit: Some(2),
            }
        );
    }

    #[test]
    fn csv_column_without_limit_reads_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "pairs.csv", "symbol\nAAA\nBBB\nCCC\n");
        let parsed = parse_pairs_spec(&format!("{path}:symbol")).unwrap();
        assert_eq!(parsed.symbols, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn csv_negative_limit_means_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "pairs.csv", "symbol\nAAA\nBBB\n");
        let parsed = parse_pairs_spec(&format!("{path}:symbol:-1")).unwrap();
        assert_eq!(parsed.symbols.len(), 2);
    }

    #[test]
    fn csv_missing_column_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "pairs.csv", "name,symbol,vol\nfoo,AAA,1\n");
        let err = parse_pairs_spec(&format!("{path}:ticker")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'ticker' not found"));
        assert!(msg.contains("name, symbol, vol"));
    }

    #[test]
    fn csv_without_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "pairs.csv", "symbol\nAAA\n");
        let err = parse_pairs_spec(&path).unwrap_err();
        assert!(err.to_string().contains("requires a column"));
    }

    #[test]
    fn text_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "list.txt", "BTC/USD\n# comment\n\nETH/USD\n");
        let parsed = parse_pairs_spec(&path).unwrap();
        assert_eq!(parsed.symbols, vec!["BTC/USD", "ETH/USD"]);
    }

    #[test]
    fn text_file_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "list.txt", "A/USD\nB/USD\nC/USD\n");
        let parsed = parse_pairs_spec(&format!("{path}:2")).unwrap();
        assert_eq!(parsed.symbols, vec!["A/USD", "B/USD"]);
    }

    #[test]
    fn text_file_bad_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "list.txt", "A/USD\n");
        let err = parse_pairs_spec(&format!("{path}:many")).unwrap_err();
        assert!(err.to_string().contains("invalid limit"));
    }

    #[test]
    fn unknown_path_form_is_an_error() {
        let err = parse_pairs_spec("/etc/passwd.dat").unwrap_err();
        assert!(err.to_string().contains("unrecognized form"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = parse_pairs_spec("./does-not-exist.txt").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn empty_spec_is_an_error() {
        assert!(parse_pairs_spec("").is_err());
        assert!(parse_pairs_spec("  ,, ").is_err());
    }
}
