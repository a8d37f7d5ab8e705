use std::fmt;
use std::time::Duration;

/// Elapsed time shown for a file that has not been processed yet.
pub const ZERO_ELAPSED: &str = "00:00.000";

/// Processing status of a single model file in the current listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStatus {
    /// Listed but not touched by the current run
    #[default]
    None,
    Reading,
    Cleaning,
    Succeeded,
    Failed,
}

impl FileStatus {
    /// Label shown in the status column. Empty for untouched files.
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::None => "",
            FileStatus::Reading => "Reading",
            FileStatus::Cleaning => "Cleaning",
            FileStatus::Succeeded => "Cleaned",
            FileStatus::Failed => "Failed",
        }
    }

    /// True once the tool has reported a final outcome for the file.
    pub fn is_finished(&self) -> bool {
        matches!(self, FileStatus::Succeeded | FileStatus::Failed)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Content encoding of a model file, derived from its first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Binary,
}

impl Encoding {
    /// Classify a first line: text if every byte (after trimming) is printable ASCII.
    pub fn from_first_line(line: &[u8]) -> Self {
        let trimmed = line.trim_ascii();
        if trimmed.iter().all(|b| (0x20..=0x7e).contains(b)) {
            Encoding::Ascii
        } else {
            Encoding::Binary
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ASCII MDL",
            Encoding::Binary => "Binary MDL",
        }
    }
}

/// One row of the file table.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedFile {
    pub name: String,
    pub size: u64,
    pub encoding: Encoding,
    pub status: FileStatus,
    pub fixes: u32,
    pub elapsed: String,
}

impl ManagedFile {
    /// Create a freshly scanned entry with no run data attached.
    pub fn new(name: impl Into<String>, size: u64, encoding: Encoding) -> Self {
        Self {
            name: name.into(),
            size,
            encoding,
            status: FileStatus::None,
            fixes: 0,
            elapsed: ZERO_ELAPSED.to_string(),
        }
    }
}

/// Format a duration as `mm:ss.zzz`. Minutes wrap at one hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1_000) % 60;
    let millis = total_ms % 1_000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}
