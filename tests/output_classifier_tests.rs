//! Integration tests for the output classifier and line splitter
//!
//! A realistic transcript is fed through arbitrary read boundaries; the
//! classified result must not depend on where the reads were split.

use cleanmodels_front::services::{LineSplitter, OutputClassifier, OutputEvent, OutputLine};
use proptest::prelude::*;

const TRANSCRIPT: &str = "\
Clean Models 3.2 starting\r
..........\r
Attempting to read foo.mdl\r
MDL foo.mdl loaded.\r
Fixes made = 3\r
foo.mdl written.\r
----------\r
Attempting to read bar.mdl\r
*** Cannot open bar.mdl\r
Attempting to read baz.mdl\r
Binary file baz.mdl detected, attempting import.\r
** Load failed for baz.mdl\r
.\r
Done.";

/// Split `bytes` at the given cut points and run them through a splitter.
fn split_at(bytes: &[u8], cuts: &[usize]) -> Vec<String> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut splitter = LineSplitter::new();
    let mut lines = Vec::new();
    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
        lines.extend(splitter.push(&bytes[start..cut]));
        start = cut;
    }
    lines.extend(splitter.finish());
    lines
}

fn events(lines: &[OutputLine]) -> Vec<OutputEvent> {
    lines.iter().map(|l| l.event.clone()).collect()
}

#[test]
fn test_transcript_classification() {
    let classifier = OutputClassifier::new();
    let lines = classifier.classify_lines(split_at(TRANSCRIPT.as_bytes(), &[]));

    assert_eq!(
        events(&lines),
        vec![
            OutputEvent::Other,
            OutputEvent::Divider,
            OutputEvent::ReadStarted {
                file: "foo.mdl".to_string()
            },
            OutputEvent::ModelLoaded {
                file: "foo.mdl".to_string()
            },
            OutputEvent::FixesMade { count: 3 },
            OutputEvent::Written,
            OutputEvent::Divider,
            OutputEvent::ReadStarted {
                file: "bar.mdl".to_string()
            },
            OutputEvent::Failed,
            OutputEvent::ReadStarted {
                file: "baz.mdl".to_string()
            },
            OutputEvent::BinaryImport {
                file: "baz.mdl".to_string()
            },
            OutputEvent::Failed,
            OutputEvent::Divider,
            OutputEvent::Other,
        ]
    );

    // Terminators are gone, text is otherwise verbatim
    assert_eq!(lines[5].text, "foo.mdl written.");
    assert_eq!(lines.last().map(|l| l.text.as_str()), Some("Done."));
}

#[test]
fn test_first_matching_rule_wins() {
    let classifier = OutputClassifier::new();
    // Also matches the written rule, but reads are checked first
    assert_eq!(
        classifier.classify("Attempting to read written.mdl"),
        OutputEvent::ReadStarted {
            file: "written.mdl".to_string()
        }
    );
    assert_eq!(classifier.classify("Fixes made = 99999999999"), OutputEvent::Other);
    assert_eq!(classifier.classify(""), OutputEvent::Other);
}

#[test]
fn test_line_split_across_reads_is_whole() {
    let mut splitter = LineSplitter::new();
    assert!(splitter.push(b"Attempting to re").is_empty());
    assert_eq!(splitter.push(b"ad foo.mdl\r\nMDL"), vec!["Attempting to read foo.mdl"]);
    assert_eq!(splitter.push(b" foo.mdl loaded.\n"), vec!["MDL foo.mdl loaded."]);
    assert_eq!(splitter.finish(), None);
}

proptest! {
    #[test]
    fn prop_chunk_boundaries_do_not_matter(cuts in prop::collection::vec(any::<usize>(), 0..24)) {
        let classifier = OutputClassifier::new();
        let whole = classifier.classify_lines(split_at(TRANSCRIPT.as_bytes(), &[]));
        let chunked = classifier.classify_lines(split_at(TRANSCRIPT.as_bytes(), &cuts));
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn prop_arbitrary_text_never_panics(line in "\\PC{0,80}") {
        let _ = OutputClassifier::new().classify(&line);
    }
}
