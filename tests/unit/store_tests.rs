/*!
 * Tests for the shared subtitle table
 */

use subbatch::subtitle_processor::{SubtitleFormat, SubtitleParser};
use subbatch::translation::{SubtitleStore, TranslationMap};
use subbatch::TranslationError;
use crate::common;

fn mapping(range: std::ops::RangeInclusive<u64>, tag: &str) -> TranslationMap {
    range.map(|i| (i, format!("{} {}", tag, i))).collect()
}

/// Disjoint mappings give the same table whatever the merge order
#[test]
fn test_merge_withDisjointMappingsInAnyOrder_shouldConverge() {
    let parts = [mapping(1..=3, "a"), mapping(4..=6, "b"), mapping(7..=9, "c")];
    let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0], [2, 0, 1]];

    let mut results = Vec::new();
    for order in orders {
        let store = SubtitleStore::new();
        store.load_text(&common::tabular_document(10));
        for i in order {
            store.merge(&parts[i]);
        }
        results.push(store.snapshot());
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(results[0][9].translated_text, "");
}

#[test]
fn test_selectPending_afterFullMerge_shouldBeEmpty() {
    let store = SubtitleStore::new();
    store.load_text(&common::tabular_document(5));
    assert_eq!(store.select_pending().len(), 5);

    store.merge(&mapping(1..=5, "done"));
    assert!(store.select_pending().is_empty());
    assert_eq!(store.translated_count(), 5);
}

/// Exported SRT parses back to the same indices and timings
#[test]
fn test_toSrt_afterMerge_shouldParseBackWithTranslations() {
    let store = SubtitleStore::new();
    store.load_text(&common::srt_document(4));
    store.merge(&mapping(1..=4, "Dòng"));

    let reparsed = SubtitleParser::parse(&store.to_srt());

    assert_eq!(reparsed.format, SubtitleFormat::Srt);
    assert_eq!(reparsed.len(), 4);
    for (original, exported) in store.snapshot().iter().zip(&reparsed.units) {
        assert_eq!(original.index, exported.index);
        assert_eq!(original.time_range, exported.time_range);
        assert_eq!(exported.source_text, original.translated_text);
    }
}

#[test]
fn test_toTabular_withUntranslatedUnit_shouldLeaveTranslationColumnEmpty() {
    let store = SubtitleStore::new();
    store.load_text("1\tHello\n2\tBye");
    store.apply_manual_edit(1, "Salut");

    let table = store.to_tabular();
    let rows: Vec<&str> = table.lines().collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], "1\tHello\tSalut\t");
    assert_eq!(rows[2], "2\tBye\t\t");
}

#[test]
fn test_replace_withNewText_shouldDropPreviousTranslations() {
    let store = SubtitleStore::new();
    store.load_text("1\tOld");
    store.apply_manual_edit(1, "Ancien");

    assert_eq!(store.load_text("1\tNew\n2\tMore"), 2);
    assert_eq!(store.translated_count(), 0);
    assert_eq!(store.snapshot()[0].source_text, "New");
}

#[test]
fn test_tryBeginRun_fromClonedHandle_shouldBeRefused() {
    let store = SubtitleStore::new();
    let other_handle = store.clone();

    let _lease = store.try_begin_run().unwrap();
    assert!(matches!(other_handle.try_begin_run(), Err(TranslationError::RunInProgress)));
}

#[test]
fn test_clear_shouldForgetUnitsAndFormat() {
    let store = SubtitleStore::new();
    store.load_text(&common::srt_document(2));
    store.clear();

    assert!(store.is_empty());
    assert_eq!(store.format(), None);
}
