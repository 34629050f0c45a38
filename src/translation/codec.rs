/*!
 * Wire format for batch requests and replies.
 *
 * A batch goes out as one `index<TAB>source` line per unit after a short
 * preamble restating the reply grammar. The model is expected to answer with
 * one `index: translation` line per unit.
 */

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::TranslationUnit;

/// Translations keyed by unit index
pub type TranslationMap = BTreeMap<u64, String>;

// @const: Reply line grammar, `index: translation`
static REPLY_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*:\s*(.*)$").expect("valid reply line regex")
});

/// Preamble placed before the batch lines in the user message
pub const PAYLOAD_PREAMBLE: &str = "Translate the following subtitle lines according to the instructions.\n\
REMINDER, required format: index: translated text\n\n\
LINES TO TRANSLATE:\n";

/// The two-message exchange sent for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPayload {
    /// System message: the guide prompt
    pub system: String,

    /// User message: preamble plus one line per unit
    pub user: String,
}

/// Encoder/decoder for the batch wire grammar
pub struct BatchCodec;

impl BatchCodec {
    /// Build the request for a batch of units
    pub fn encode(units: &[TranslationUnit], guide_prompt: &str) -> BatchPayload {
        let lines = units
            .iter()
            .map(|unit| format!("{}\t{}", unit.index, Self::flatten(&unit.source_text)))
            .collect::<Vec<_>>()
            .join("\n");

        BatchPayload {
            system: guide_prompt.to_string(),
            user: format!("{}{}", PAYLOAD_PREAMBLE, lines),
        }
    }

    /// Extract `index: translation` lines from a model reply.
    ///
    /// Lines that do not match are ignored; an empty map means nothing usable came back.
    pub fn decode(reply_text: &str) -> TranslationMap {
        let normalized = reply_text.replace("\r\n", "\n").replace('\r', "\n");
        let mut mapping = TranslationMap::new();

        for line in normalized.split('\n').map(str::trim).filter(|line| !line.is_empty()) {
            let Some(caps) = REPLY_LINE_REGEX.captures(line) else {
                continue;
            };
            let Ok(index) = caps[1].parse::<u64>() else {
                continue;
            };
            mapping.insert(index, caps[2].trim().to_string());
        }

        mapping
    }

    /// Collapse embedded line breaks so a unit always occupies one wire line
    fn flatten(text: &str) -> String {
        text.replace("\r\n", " ").replace(['\n', '\r'], " ").trim().to_string()
    }
}
