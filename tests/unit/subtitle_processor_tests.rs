/*!
 * Tests for subtitle parsing
 */

use subbatch::subtitle_processor::{SubtitleFormat, SubtitleParser, TranslationUnit, PLACEHOLDER_TIME_RANGE};
use crate::common;

/// N well-formed blocks become N timed units in index order
#[test]
fn test_parse_withWellFormedSrt_shouldYieldOneTimedUnitPerBlock() {
    let parsed = SubtitleParser::parse(&common::srt_document(25));

    assert_eq!(parsed.format, SubtitleFormat::Srt);
    assert_eq!(parsed.len(), 25);
    assert!(parsed.units.iter().all(|unit| unit.time_range.is_some()));
    assert!(parsed.units.windows(2).all(|pair| pair[0].index < pair[1].index));
}

/// Stated integers become indices, in input order
#[test]
fn test_parse_withTabLines_shouldKeepStatedIndicesInInputOrder() {
    let parsed = SubtitleParser::parse("30\tThirty\n4\tFour\n17\tSeventeen");

    assert_eq!(parsed.format, SubtitleFormat::Tabular);
    let indices: Vec<u64> = parsed.units.iter().map(|u| u.index).collect();
    assert_eq!(indices, vec![30, 4, 17]);
    assert_eq!(parsed.units[1].source_text, "Four");
}

#[test]
fn test_parse_withBareLines_shouldNumberFromOne() {
    let parsed = SubtitleParser::parse("Hello\nWorld");
    assert_eq!(
        parsed.units,
        vec![TranslationUnit::new(1, "Hello"), TranslationUnit::new(2, "World")]
    );
}

#[test]
fn test_parse_withBlankInput_shouldBeEmpty() {
    assert!(SubtitleParser::parse("").is_empty());
    assert!(SubtitleParser::parse(" \r\n\t\n ").is_empty());
}

#[test]
fn test_parse_withOverflowingIndex_shouldTreatFieldAsText() {
    let parsed = SubtitleParser::parse("99999999999999999999999\tHuge");
    assert_eq!(parsed.units[0].index, 1);
    assert_eq!(parsed.units[0].source_text, "99999999999999999999999\tHuge");
}

#[test]
fn test_parse_withBlankLineNoise_shouldSkipShortBlocks() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\nKept\n\n   \n\n2\n\n3\n00:00:03,000 --> 00:00:04,000\nAlso kept";
    let parsed = SubtitleParser::parse(raw);
    let indices: Vec<u64> = parsed.units.iter().map(|u| u.index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[test]
fn test_unitDisplay_withoutTiming_shouldUsePlaceholder() {
    let unit = TranslationUnit::new(4, "Source").with_translation("  Dịch  ");
    assert_eq!(unit.to_string(), format!("4\n{}\nDịch", PLACEHOLDER_TIME_RANGE));
}
