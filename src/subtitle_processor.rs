use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use log::debug;

// @module: Subtitle parsing into translation units

// @const: Blank-line block separator for SRT content
static BLOCK_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n\s*\n").expect("valid block separator regex")
});

// @const: Purely numeric field
static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+$").expect("valid numeric regex")
});

/// Marker that identifies an SRT time-range line
pub const TIME_ARROW: &str = "-->";

/// Time range written for units that never had one
pub const PLACEHOLDER_TIME_RANGE: &str = "00:00:00,000 --> 00:00:00,000";

// @struct: Single translatable subtitle line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    // @field: Caller-visible ordering key
    pub index: u64,

    // @field: Verbatim timing span, if the source had one
    pub time_range: Option<String>,

    // @field: Flattened source text
    pub source_text: String,

    // @field: Translation, empty while untranslated
    pub translated_text: String,
}

impl TranslationUnit {
    /// Create an untranslated unit without timing
    pub fn new(index: u64, source_text: impl Into<String>) -> Self {
        Self {
            index,
            time_range: None,
            source_text: source_text.into(),
            translated_text: String::new(),
        }
    }

    /// Attach the verbatim time range line
    pub fn with_time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = Some(time_range.into());
        self
    }

    /// Set the translation
    pub fn with_translation(mut self, translated_text: impl Into<String>) -> Self {
        self.translated_text = translated_text.into();
        self
    }

    /// A unit counts as translated once it has non-whitespace translation text
    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }

    /// Time range for export, falling back to a zero-length placeholder
    pub fn time_range_or_placeholder(&self) -> &str {
        match self.time_range.as_deref() {
            Some(range) if !range.is_empty() => range,
            _ => PLACEHOLDER_TIME_RANGE,
        }
    }

    /// Text for export: the translation, or the source when untranslated
    pub fn display_text(&self) -> &str {
        let translated = self.translated_text.trim();
        if translated.is_empty() {
            self.source_text.trim()
        } else {
            translated
        }
    }
}

impl fmt::Display for TranslationUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{}", self.time_range_or_placeholder())?;
        write!(f, "{}", self.display_text())
    }
}

/// Input grammar that produced a unit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// SubRip blocks
    Srt,
    /// One `index<TAB>text` (or comma) line per unit
    Tabular,
}

impl SubtitleFormat {
    // @returns: Short label used in logs and output names
    pub fn label(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Tabular => "tsv",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of parsing a raw text blob
#[derive(Debug, Clone)]
pub struct ParsedSubtitles {
    /// Parsed units, sorted by index for SRT input, file order for tabular input
    pub units: Vec<TranslationUnit>,

    /// Grammar that produced the units
    pub format: SubtitleFormat,
}

impl ParsedSubtitles {
    /// Whether nothing usable was found
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of parsed units
    pub fn len(&self) -> usize {
        self.units.len()
    }
}

/// Tolerant parser for SRT and tabular subtitle text
pub struct SubtitleParser;

impl SubtitleParser {
    /// Parse raw text, choosing the grammar from its content.
    ///
    /// Never fails: unparseable input yields an empty unit list, which callers
    /// should report as "no data".
    pub fn parse(raw_text: &str) -> ParsedSubtitles {
        if raw_text.contains(TIME_ARROW) {
            let units = Self::parse_srt(raw_text);
            if !units.is_empty() {
                debug!("Parsed {} units as SRT", units.len());
                return ParsedSubtitles { units, format: SubtitleFormat::Srt };
            }
            debug!("Content has time arrows but no SRT block parsed, falling back to tabular");
        }

        let units = Self::parse_tabular(raw_text);
        debug!("Parsed {} units as tabular text", units.len());
        ParsedSubtitles { units, format: SubtitleFormat::Tabular }
    }

    /// Parse SubRip blocks. Blocks without a time range are dropped.
    pub fn parse_srt(raw_text: &str) -> Vec<TranslationUnit> {
        let text = Self::normalize(raw_text);
        if text.is_empty() {
            return Vec::new();
        }

        let mut units: Vec<TranslationUnit> = Vec::new();

        for block in BLOCK_SEPARATOR_REGEX.split(&text) {
            let lines: Vec<&str> = block.split('\n').filter(|line| !line.is_empty()).collect();
            if lines.len() < 2 {
                continue;
            }

            let mut start_at = 0;
            let explicit_index = Self::parse_index(lines[0]);
            if explicit_index.is_some() {
                start_at = 1;
            }

            // The time line may sit at most one line below where it is expected
            let search_end = (start_at + 2).min(lines.len());
            let Some(time_pos) = (start_at..search_end).find(|&i| lines[i].contains(TIME_ARROW)) else {
                continue;
            };
            let time_range = lines[time_pos].trim().to_string();

            let source_text = lines[time_pos + 1..]
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            let index = explicit_index.unwrap_or(units.len() as u64 + 1);
            units.push(TranslationUnit::new(index, source_text).with_time_range(time_range));
        }

        units.sort_by_key(|unit| unit.index);
        units
    }

    /// Parse spreadsheet-style lines: `index<TAB>text`, `index,text` or bare text.
    ///
    /// The auto index advances on every line, including lines that carry their own
    /// index, so mixed input can produce repeated indices.
    pub fn parse_tabular(raw_text: &str) -> Vec<TranslationUnit> {
        let text = Self::normalize(raw_text);
        if text.is_empty() {
            return Vec::new();
        }

        let mut units = Vec::new();
        let mut auto_index: u64 = 1;

        for line in text.split('\n').filter(|line| !line.trim().is_empty()) {
            let fields = if line.contains('\t') {
                line.split_once('\t')
            } else {
                line.split_once(',')
            };

            let unit = match fields {
                Some((left, right)) => match Self::parse_index(left) {
                    Some(index) => TranslationUnit::new(index, right.trim()),
                    None => TranslationUnit::new(auto_index, line.trim()),
                },
                None => TranslationUnit::new(auto_index, line.trim()),
            };

            units.push(unit);
            auto_index += 1;
        }

        units
    }

    /// Unify line endings and trim the outer whitespace
    fn normalize(raw_text: &str) -> String {
        raw_text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
    }

    /// Parse a purely numeric field; values that overflow are not indices
    fn parse_index(field: &str) -> Option<u64> {
        let field = field.trim();
        if NUMERIC_REGEX.is_match(field) {
            field.parse().ok()
        } else {
            None
        }
    }
}
