use regex::{Captures, Regex};

/// Lifecycle event recognized in one line of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Divider line (`........`, `-----`, a lone `.`); never shown
    Divider,
    /// `Attempting to read <file>`
    ReadStarted { file: String },
    /// `MDL <file> loaded.`
    ModelLoaded { file: String },
    /// `Binary file <file> detected, attempting import.`
    BinaryImport { file: String },
    /// `Fixes made = <count>`
    FixesMade { count: u32 },
    /// `<anything> written.`
    Written,
    /// `*** Cannot ...` or `** Load failed ...`
    Failed,
    /// Anything else
    Other,
}

/// A classified line together with its original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub event: OutputEvent,
}

type EventBuilder = fn(&Captures) -> Option<OutputEvent>;

/// One entry of the ordered matcher list.
enum Matcher {
    Divider,
    Pattern { regex: Regex, build: EventBuilder },
}

impl Matcher {
    fn pattern(pattern: &str, build: EventBuilder) -> Self {
        Matcher::Pattern {
            regex: Regex::new(pattern).expect("Invalid output pattern"),
            build,
        }
    }

    fn classify(&self, line: &str) -> Option<OutputEvent> {
        match self {
            Matcher::Divider => is_divider(line).then_some(OutputEvent::Divider),
            Matcher::Pattern { regex, build } => regex.captures(line).and_then(|caps| build(&caps)),
        }
    }
}

fn capture(caps: &Captures, group: usize) -> String {
    caps.get(group)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// A lone `.` or a run of one repeated character.
pub fn is_divider(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str();
            line == "." || (!rest.is_empty() && rest.chars().all(|c| c == first))
        }
        None => false,
    }
}

/// Classifier for `cleanmodels-cli` standard output.
///
/// Matchers are tried in order and the first hit wins; a line nothing
/// matches becomes [`OutputEvent::Other`].
pub struct OutputClassifier {
    matchers: Vec<Matcher>,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self {
            matchers: vec![
                Matcher::Divider,
                Matcher::pattern(r"Attempting to read (.*)", |caps| {
                    Some(OutputEvent::ReadStarted {
                        file: capture(caps, 1),
                    })
                }),
                Matcher::pattern(r"MDL\s(.*)\sloaded\.", |caps| {
                    Some(OutputEvent::ModelLoaded {
                        file: capture(caps, 1),
                    })
                }),
                Matcher::pattern(r"Binary file (.*) detected, attempting import\.", |caps| {
                    Some(OutputEvent::BinaryImport {
                        file: capture(caps, 1),
                    })
                }),
                Matcher::pattern(r"Fixes made = (\d+)", |caps| {
                    // Counts that overflow fall through to plain output
                    capture(caps, 1)
                        .parse()
                        .ok()
                        .map(|count| OutputEvent::FixesMade { count })
                }),
                Matcher::pattern(r"(.*) written\.", |_| Some(OutputEvent::Written)),
                Matcher::pattern(r"\*\*\* Cannot(.*)|\*\* Load failed(.*)", |_| {
                    Some(OutputEvent::Failed)
                }),
            ],
        }
    }

    /// Classify a single line (already stripped of its line terminator).
    pub fn classify(&self, line: &str) -> OutputEvent {
        self.matchers
            .iter()
            .find_map(|matcher| matcher.classify(line))
            .unwrap_or(OutputEvent::Other)
    }

    /// Classify a batch of complete lines, keeping their text.
    pub fn classify_lines<I>(&self, lines: I) -> Vec<OutputLine>
    where
        I: IntoIterator<Item = String>,
    {
        lines
            .into_iter()
            .map(|text| {
                let event = self.classify(&text);
                OutputLine { text, event }
            })
            .collect()
    }
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-splits an arbitrarily chunked byte stream on `\n`.
///
/// A partial trailing line is held back until the rest arrives, so a line
/// split across two reads comes out once, whole. Trailing `\r` and empty
/// lines are dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(decode_line)
            .collect()
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}
