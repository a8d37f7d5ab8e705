use crate::models::file_entry::{Encoding, ManagedFile};
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use thiserror::Error;

/// Longest first line inspected when guessing the encoding.
const FIRST_LINE_LIMIT: u64 = 4096;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Input directory does not exist: {0}")]
    MissingDirectory(Utf8PathBuf),

    #[error("Failed to list {path}")]
    ReadDir {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid file pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// File-name filter built from the user's pattern. An empty pattern matches everything.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: Option<Pattern>,
}

impl NameFilter {
    pub fn new(pattern: &str) -> Result<Self, ScanError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Self { pattern: None });
        }
        Pattern::new(pattern)
            .map(|p| Self { pattern: Some(p) })
            .map_err(|source| ScanError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|p| p.matches_with(name, MATCH_OPTIONS))
    }
}

/// List the regular, readable files of `dir` matching `pattern`, sorted by name.
pub fn scan_directory(dir: &Utf8Path, pattern: &str) -> Result<Vec<ManagedFile>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::MissingDirectory(dir.to_path_buf()));
    }
    let filter = NameFilter::new(pattern)?;

    let entries = fs::read_dir(dir).map_err(|source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!("Skipping non UTF-8 file name in {}", dir);
            continue;
        };
        if !filter.matches(&name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        match detect_encoding(&dir.join(&name)) {
            Ok(encoding) => files.push(ManagedFile::new(name, metadata.len(), encoding)),
            Err(e) => tracing::debug!("Skipping unreadable file {}: {}", name, e),
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!("Scanned {}: {} file(s) match '{}'", dir, files.len(), pattern);
    Ok(files)
}

/// Read the first line of a file and classify it.
pub fn detect_encoding(path: &Utf8Path) -> io::Result<Encoding> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file.take(FIRST_LINE_LIMIT));
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line)?;
    Ok(Encoding::from_first_line(&first_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_matches_all() {
        let filter = NameFilter::new("  ").unwrap();
        assert!(filter.matches("anything.txt"));
    }

    #[test]
    fn test_pattern_ignores_case() {
        let filter = NameFilter::new("*.mdl").unwrap();
        assert!(filter.matches("foo.mdl"));
        assert!(filter.matches("FOO.MDL"));
        assert!(!filter.matches("foo.mdx"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            NameFilter::new("[*.mdl"),
            Err(ScanError::Pattern { .. })
        ));
    }
}
