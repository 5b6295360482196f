//! NDJSON (Newline Delimited JSON) tweet file utilities.
//!
//! Recorded streams are stored one `Tweet` object per line. Reading is lenient
//! by default: malformed lines are skipped and counted so a partially
//! corrupted capture can still be replayed.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::api::tweet::Tweet;

/// Error types for NDJSON file I/O and parsing.
#[derive(Error, Debug)]
pub enum NdjsonError {
    /// I/O error when reading or writing files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Empty or invalid data
    #[error("No valid data found: {context}")]
    NoData { context: String },
}

impl NdjsonError {
    /// Create a no data error
    pub fn no_data(context: impl Into<String>) -> Self {
        Self::NoData {
            context: context.into(),
        }
    }
}

/// Result of a lenient parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedLines<T> {
    pub entries: Vec<T>,
    /// 1-based line numbers that failed to parse
    pub skipped_lines: Vec<usize>,
}

/// Parse NDJSON content, skipping blank lines.
///
/// With `strict` set the first malformed line is returned as an error,
/// otherwise it is recorded in `skipped_lines`.
pub fn parse_ndjson_str<T>(content: &str, strict: bool) -> Result<ParsedLines<T>, NdjsonError>
where
    T: DeserializeOwned,
{
    let mut parsed = ParsedLines {
        entries: Vec::new(),
        skipped_lines: Vec::new(),
    };

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(line) {
            Ok(entry) => parsed.entries.push(entry),
            Err(source) if strict => {
                return Err(NdjsonError::JsonParse {
                    line: index + 1,
                    source,
                })
            }
            Err(e) => {
                tracing::warn!("⚠️ [NDJSON] Skipping line {}: {}", index + 1, e);
                parsed.skipped_lines.push(index + 1);
            }
        }
    }

    Ok(parsed)
}

/// Read a tweet capture file leniently.
///
/// Returns `NoData` when the file contains no valid tweet at all.
pub fn read_tweets(path: &Path) -> Result<ParsedLines<Tweet>, NdjsonError> {
    let content = std::fs::read_to_string(path)?;
    let parsed = parse_ndjson_str::<Tweet>(&content, false)?;
    if parsed.entries.is_empty() {
        return Err(NdjsonError::no_data(format!(
            "No valid tweets found in file '{}'",
            path.display()
        )));
    }

    Ok(parsed)
}

/// Write entries as NDJSON, one object per line.
pub fn write_ndjson<T: Serialize>(path: &Path, entries: &[T]) -> Result<(), NdjsonError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in entries {
        let line = serde_json::to_string(entry).map_err(NdjsonError::Serialize)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_lenient_parse_skips_bad_lines() {
        let content = r#"{"id":"1","text":"a","author_id":"u"}

not json
{"id":"2","text":"b","author_id":"u","retweeted_id":"1"}
"#;
        let parsed = parse_ndjson_str::<Tweet>(content, false).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.skipped_lines, vec![3]);
        assert!(parsed.entries[1].is_retweet());
    }

    #[test]
    fn test_strict_parse_reports_line() {
        let content = "{\"id\":\"1\",\"text\":\"a\",\"author_id\":\"u\"}\n{broken\n";
        match parse_ndjson_str::<Tweet>(content, true) {
            Err(error @ NdjsonError::JsonParse { line: 2, .. }) => {
                assert!(error.source().is_some());
                assert!(error.to_string().contains("line 2"));
            }
            other => panic!("Expected JsonParse error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.ndjson");
        let tweets = vec![
            Tweet::original("1", "alice", "rust is great").with_followers(10),
            Tweet::retweet("2", "bob", "1", "RT rust is great"),
        ];

        write_ndjson(&path, &tweets).unwrap();
        let parsed = read_tweets(&path).unwrap();

        assert_eq!(parsed.entries, tweets);
        assert!(parsed.skipped_lines.is_empty());
    }

    #[test]
    fn test_read_empty_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.ndjson");
        std::fs::write(&path, "\n\n").unwrap();

        assert!(matches!(read_tweets(&path), Err(NdjsonError::NoData { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_tweets(Path::new("definitely_missing.ndjson"));
        assert!(matches!(result, Err(NdjsonError::Io(_))));
    }
}
