//! Integration tests for directory scanning and tool lookup

use camino::Utf8PathBuf;
use cleanmodels_front::models::{Encoding, FileStatus, ZERO_ELAPSED};
use cleanmodels_front::services::{ScanError, scan_directory};
use std::fs;
use tempfile::TempDir;

fn create_input_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, dir)
}

#[test]
fn test_scan_filters_sorts_and_detects_encoding() {
    let (_temp_dir, dir) = create_input_dir();
    fs::write(dir.join("zeta.mdl"), "# MDL ascii model\nnode dummy zeta\n").unwrap();
    fs::write(dir.join("alpha.MDL"), [0u8, 0, 0, 12, 0xff, 0x01, b'\n']).unwrap();
    fs::write(dir.join("notes.txt"), "not a model\n").unwrap();
    fs::create_dir(dir.join("sub.mdl")).unwrap();

    let files = scan_directory(&dir, "*.mdl").unwrap();
    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

    // Case-insensitive match, directories skipped, sorted by name
    assert_eq!(names, vec!["alpha.MDL", "zeta.mdl"]);
    assert_eq!(files[0].encoding, Encoding::Binary);
    assert_eq!(files[1].encoding, Encoding::Ascii);
    assert_eq!(files[1].size, 34);

    for file in &files {
        assert_eq!(file.status, FileStatus::None);
        assert_eq!(file.fixes, 0);
        assert_eq!(file.elapsed, ZERO_ELAPSED);
    }
}

#[test]
fn test_empty_pattern_matches_everything() {
    let (_temp_dir, dir) = create_input_dir();
    fs::write(dir.join("a.mdl"), "a\n").unwrap();
    fs::write(dir.join("b.txt"), "b\n").unwrap();

    assert_eq!(scan_directory(&dir, "").unwrap().len(), 2);
    assert_eq!(scan_directory(&dir, "  ").unwrap().len(), 2);
}

#[test]
fn test_empty_file_is_ascii() {
    let (_temp_dir, dir) = create_input_dir();
    fs::write(dir.join("empty.mdl"), "").unwrap();

    let files = scan_directory(&dir, "*.mdl").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].size, 0);
    assert_eq!(files[0].encoding, Encoding::Ascii);
}

#[test]
fn test_missing_directory_is_an_error() {
    let (_temp_dir, dir) = create_input_dir();
    let missing = dir.join("nope");

    match scan_directory(&missing, "*.mdl") {
        Err(ScanError::MissingDirectory(path)) => assert_eq!(path, missing),
        other => panic!("expected MissingDirectory, got {:?}", other.map(|f| f.len())),
    }
}

#[test]
fn test_invalid_pattern_is_an_error() {
    let (_temp_dir, dir) = create_input_dir();
    assert!(matches!(
        scan_directory(&dir, "[unclosed"),
        Err(ScanError::Pattern { .. })
    ));
}
