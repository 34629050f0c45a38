/*!
 * Tests for file utilities
 */

use subbatch::file_utils::FileManager;
use crate::common;

#[test]
fn test_writeToFile_withMissingParent_shouldCreateDirectories() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("a").join("b").join("out.srt");

    FileManager::write_to_file(&path, "1\n00:00:00,000 --> 00:00:00,000\nHi\n").unwrap();

    assert!(FileManager::file_exists(&path));
    assert!(FileManager::dir_exists(temp_dir.path().join("a")));
}

#[test]
fn test_readSubtitleText_withInvalidUtf8_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("latin1.srt");
    std::fs::write(&path, [0x31, 0x0a, 0xe9, 0xe8]).unwrap();

    assert!(FileManager::read_subtitle_text(&path).is_err());
}

#[test]
fn test_isSubtitleInput_shouldAcceptKnownExtensionsOnly() {
    assert!(FileManager::is_subtitle_input("movie.SRT"));
    assert!(FileManager::is_subtitle_input("lines.tsv"));
    assert!(FileManager::is_subtitle_input("notes.txt"));
    assert!(!FileManager::is_subtitle_input("movie.mkv"));
    assert!(!FileManager::is_subtitle_input("README"));
}

#[test]
fn test_findSubtitleFiles_withSampleSubtitle_shouldFindIt() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt").unwrap();

    let found = FileManager::find_subtitle_files(temp_dir.path()).unwrap();
    assert_eq!(found, vec![path]);
}
