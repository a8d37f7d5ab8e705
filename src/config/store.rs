//! Field-level access to the tool's `last_dirs.pl` configuration file.
//!
//! The file is a list of Prolog assertions, one fact per line:
//!
//! ```text
//! :-asserta(g_indir('models/in')).
//! :-asserta(g_user_option(snap,fine)).
//! :-asserta(g_user_option(rescaleXYZ,[2,1,1])).
//! ```
//!
//! There is no full parser or serializer. Reading scans for lines of that
//! shape; writing patches a single fact in place with a regex substitution
//! and leaves every other byte of the file alone.

use crate::models::options::{ConfigKey, USER_OPTION_PREDICATE, quote_atom};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::{NoExpand, Regex};
use std::fs::{self, OpenOptions};
use std::io;
use thiserror::Error;

/// Template used to seed a missing configuration file.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../assets/last_dirs.pl");

/// Extension given to exported configuration files.
pub const EXPORT_EXTENSION: &str = "cm";

const ASSERT_PREFIX: &str = ":-asserta(";
const ASSERT_SUFFIX: &str = ").";

#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("Could not open {path} for saving")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {path}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy {from} to {to}")]
    Copy {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid search pattern for {key}")]
    Pattern {
        key: String,
        #[source]
        source: regex::Error,
    },
}

/// One fact read from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: ConfigKey,
    pub value: String,
}

/// Parse one assertion line. Returns `None` for anything not of the expected shape.
pub fn parse_line(line: &str) -> Option<ConfigEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let body = line.strip_prefix(ASSERT_PREFIX)?.strip_suffix(ASSERT_SUFFIX)?;

    // body is now `predicate(args)`
    let open = body.find('(')?;
    let predicate = body[..open].trim();
    let args = body[open + 1..].strip_suffix(')')?;
    if predicate.is_empty() || args.is_empty() {
        return None;
    }

    if predicate == USER_OPTION_PREDICATE {
        let (name, value) = split_top_level_comma(args)?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return None;
        }
        Some(ConfigEntry {
            key: ConfigKey::user(unquote(name)),
            value: unquote(value),
        })
    } else {
        Some(ConfigEntry {
            key: ConfigKey::core(predicate),
            value: unquote(args.trim()),
        })
    }
}

/// Split at the first comma that is outside quotes and brackets.
fn split_top_level_comma(args: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut quoted = false;
    for (i, c) in args.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '[' | '(' if !quoted => depth += 1,
            ']' | ')' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => return Some((&args[..i], &args[i + 1..])),
            _ => {}
        }
    }
    None
}

fn unquote(raw: &str) -> String {
    match raw
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => raw.to_string(),
    }
}

/// Handle on the live configuration file of the tool.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Utf8PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Create the file from a template when it does not exist yet.
    ///
    /// Uses `template` when given, otherwise the bundled default. Returns true
    /// if the file was created.
    pub fn ensure_seeded(&self, template: Option<&Utf8Path>) -> Result<bool, ConfigStoreError> {
        if self.path.is_file() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigStoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match template {
            Some(template) => {
                fs::copy(template, &self.path).map_err(|source| ConfigStoreError::Copy {
                    from: template.to_path_buf(),
                    to: self.path.clone(),
                    source,
                })?;
                tracing::info!("Seeded {} from template {}", self.path, template);
            }
            None => {
                fs::write(&self.path, DEFAULT_TEMPLATE).map_err(|source| {
                    ConfigStoreError::Write {
                        path: self.path.clone(),
                        source,
                    }
                })?;
                tracing::info!("Seeded {} from bundled defaults", self.path);
            }
        }
        Ok(true)
    }

    /// Read every recognized fact. Later lines for the same key win.
    pub fn load(&self) -> Result<IndexMap<ConfigKey, String>, ConfigStoreError> {
        let text = fs::read_to_string(&self.path).map_err(|source| ConfigStoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut entries = IndexMap::new();
        let mut skipped = 0usize;
        for line in text.lines() {
            match parse_line(line) {
                Some(entry) => {
                    entries.insert(entry.key, entry.value);
                }
                None => skipped += usize::from(!line.trim().is_empty()),
            }
        }

        tracing::info!(
            "Loaded {} entries from {} ({} other lines)",
            entries.len(),
            self.path,
            skipped
        );
        Ok(entries)
    }

    /// Replace the value of an existing fact. Returns the number of lines rewritten.
    ///
    /// Core values are written quoted, user option values bare. A key with no
    /// assertion in the file is left alone and reported as zero replacements.
    pub fn write(&self, key: &ConfigKey, value: &str) -> Result<usize, ConfigStoreError> {
        let (pattern, replacement) = substitution(key, value);
        let regex = Regex::new(&pattern).map_err(|source| ConfigStoreError::Pattern {
            key: key.to_string(),
            source,
        })?;

        // The file must be writable before anything is touched
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| ConfigStoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        let text = fs::read_to_string(&self.path).map_err(|source| ConfigStoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        let count = regex.find_iter(&text).count();
        if count == 0 {
            tracing::warn!("No assertion for {} in {}, nothing written", key, self.path);
            return Ok(0);
        }

        let patched = regex.replace_all(&text, NoExpand(&replacement));
        fs::write(&self.path, patched.as_bytes()).map_err(|source| ConfigStoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!("Wrote {} = {} ({} line(s))", key, value, count);
        Ok(count)
    }

    /// Copy the live file to `dest`, adding the `.cm` extension when it has none.
    pub fn export_to(&self, dest: &Utf8Path) -> Result<Utf8PathBuf, ConfigStoreError> {
        let dest = if dest.extension().is_none() {
            dest.with_extension(EXPORT_EXTENSION)
        } else {
            dest.to_path_buf()
        };

        fs::copy(&self.path, &dest).map_err(|source| ConfigStoreError::Copy {
            from: self.path.clone(),
            to: dest.clone(),
            source,
        })?;

        tracing::info!("Exported {} to {}", self.path, dest);
        Ok(dest)
    }

    /// Replace the live file with a verbatim copy of `src`.
    ///
    /// `src` is checked for readability first so a bad choice leaves the live
    /// file intact.
    pub fn import_from(&self, src: &Utf8Path) -> Result<(), ConfigStoreError> {
        fs::File::open(src).map_err(|source| ConfigStoreError::Read {
            path: src.to_path_buf(),
            source,
        })?;

        fs::copy(src, &self.path).map_err(|source| ConfigStoreError::Copy {
            from: src.to_path_buf(),
            to: self.path.clone(),
            source,
        })?;

        tracing::info!("Imported {} into {}", src, self.path);
        Ok(())
    }
}

/// Search pattern and replacement line for one key.
fn substitution(key: &ConfigKey, value: &str) -> (String, String) {
    match key {
        ConfigKey::Core(predicate) => (
            format!(r"(?mR)^:-asserta\({}\((.*)\)\)\.$", regex::escape(predicate)),
            format!(
                ":-asserta({}('{}')).",
                predicate,
                value.replace('\'', "''")
            ),
        ),
        ConfigKey::User(name) => {
            let quoted = quote_atom(name);
            (
                format!(
                    r"(?mR)^:-asserta\({}\('?{}'?,(.*)\)\)\.$",
                    USER_OPTION_PREDICATE,
                    regex::escape(name)
                ),
                format!(
                    ":-asserta({}({},{})).",
                    USER_OPTION_PREDICATE, quoted, value
                ),
            )
        }
    }
}
