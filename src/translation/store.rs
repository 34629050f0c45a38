/*!
 * Authoritative subtitle table.
 *
 * The store owns the loaded translation units, merges batch results into them,
 * selects what still needs translating, applies manual edits and renders the
 * export projections. Handles are cheap to clone and share one table.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::RwLock;

use crate::errors::TranslationError;
use crate::subtitle_processor::{ParsedSubtitles, SubtitleFormat, SubtitleParser, TranslationUnit};

use super::codec::TranslationMap;

/// Column headers of the tabular export
pub const TABULAR_HEADER: [&str; 4] = ["Index", "Source", "Translation", "Time"];

#[derive(Debug, Default)]
struct TableState {
    units: Vec<TranslationUnit>,
    format: Option<SubtitleFormat>,
}

/// Shared, lock-protected unit table
#[derive(Debug, Clone, Default)]
pub struct SubtitleStore {
    state: Arc<RwLock<TableState>>,
    run_active: Arc<AtomicBool>,
}

/// Proof that a run holds the table; releases it on drop
#[derive(Debug)]
pub struct RunLease {
    run_active: Arc<AtomicBool>,
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.run_active.store(false, Ordering::SeqCst);
    }
}

impl SubtitleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw text and load the result; returns the number of units loaded
    pub fn load_text(&self, raw_text: &str) -> usize {
        self.replace(SubtitleParser::parse(raw_text))
    }

    /// Replace the whole table with a parse result.
    ///
    /// An empty parse leaves the current table untouched and returns 0.
    pub fn replace(&self, parsed: ParsedSubtitles) -> usize {
        if parsed.is_empty() {
            return 0;
        }

        let ParsedSubtitles { mut units, format } = parsed;
        units.sort_by_key(|unit| unit.index);
        let count = units.len();

        let mut state = self.state.write();
        state.units = units;
        state.format = Some(format);
        count
    }

    /// Drop every unit
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.units.clear();
        state.format = None;
    }

    /// Untranslated units sorted by index
    pub fn select_pending(&self) -> Vec<TranslationUnit> {
        let state = self.state.read();
        let mut pending: Vec<TranslationUnit> = state
            .units
            .iter()
            .filter(|unit| !unit.is_translated())
            .cloned()
            .collect();
        pending.sort_by_key(|unit| unit.index);
        pending
    }

    /// Apply translations by index; returns how many units changed.
    ///
    /// Indices not present in the table are ignored.
    pub fn merge(&self, mapping: &TranslationMap) -> usize {
        if mapping.is_empty() {
            return 0;
        }

        let mut state = self.state.write();
        let mut applied = 0;
        for unit in state.units.iter_mut() {
            if let Some(translation) = mapping.get(&unit.index) {
                unit.translated_text = translation.clone();
                applied += 1;
            }
        }

        debug!("Merged {} of {} translations", applied, mapping.len());
        applied
    }

    /// Overwrite one unit's translation; false if the index is unknown
    pub fn apply_manual_edit(&self, index: u64, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut state = self.state.write();
        let mut found = false;
        for unit in state.units.iter_mut().filter(|unit| unit.index == index) {
            unit.translated_text = text.clone();
            found = true;
        }
        found
    }

    /// Take the run-active lease, refusing if a run already holds it
    pub fn try_begin_run(&self) -> Result<RunLease, TranslationError> {
        self.run_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TranslationError::RunInProgress)?;

        Ok(RunLease {
            run_active: Arc::clone(&self.run_active),
        })
    }

    pub fn is_run_active(&self) -> bool {
        self.run_active.load(Ordering::SeqCst)
    }

    /// Copy of the table in index order
    pub fn snapshot(&self) -> Vec<TranslationUnit> {
        self.state.read().units.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().units.is_empty()
    }

    /// Number of units that already have a translation
    pub fn translated_count(&self) -> usize {
        self.state.read().units.iter().filter(|unit| unit.is_translated()).count()
    }

    /// Format of the last successful parse
    pub fn format(&self) -> Option<SubtitleFormat> {
        self.state.read().format
    }

    /// Render the table as SubRip text
    pub fn to_srt(&self) -> String {
        let state = self.state.read();
        let blocks: Vec<String> = state.units.iter().map(|unit| unit.to_string()).collect();
        let document = blocks.join("\n\n");
        format!("{}\n", document.trim())
    }

    /// Flattened table rows in `TABULAR_HEADER` column order
    pub fn tabular_rows(&self) -> Vec<Vec<String>> {
        let state = self.state.read();
        state
            .units
            .iter()
            .map(|unit| {
                vec![
                    unit.index.to_string(),
                    Self::flatten_field(&unit.source_text),
                    Self::flatten_field(&unit.translated_text),
                    Self::flatten_field(unit.time_range.as_deref().unwrap_or_default()),
                ]
            })
            .collect()
    }

    /// Render the table as tab-separated rows: Index, Source, Translation, Time
    pub fn to_tabular(&self) -> String {
        let mut output = TABULAR_HEADER.join("\t");
        output.push('\n');

        for row in self.tabular_rows() {
            output.push_str(&row.join("\t"));
            output.push('\n');
        }

        output
    }

    /// Take translations back from a tabular export of the same input.
    ///
    /// A row is applied only when its index exists, its source matches the
    /// loaded unit and that unit is still untranslated. Returns the number applied.
    pub fn restore_from_tabular(&self, table: &str) -> usize {
        let mut state = self.state.write();
        let mut applied = 0;

        for line in table.lines().skip(1) {
            let mut fields = line.split('\t');
            let (Some(index), Some(source), Some(translation)) = (fields.next(), fields.next(), fields.next()) else {
                continue;
            };
            let Ok(index) = index.trim().parse::<u64>() else {
                continue;
            };
            if translation.trim().is_empty() {
                continue;
            }

            let matching = state.units.iter_mut().find(|unit| {
                unit.index == index && !unit.is_translated() && Self::flatten_field(&unit.source_text) == source
            });
            if let Some(unit) = matching {
                unit.translated_text = translation.to_string();
                applied += 1;
            }
        }

        debug!("Restored {} translations from a previous run", applied);
        applied
    }

    fn flatten_field(value: &str) -> String {
        value.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ")
    }
}
