/*!
 * Tests for the batch wire format
 */

use subbatch::providers::mock::{MockProvider, ECHO_PREFIX};
use subbatch::subtitle_processor::SubtitleParser;
use subbatch::translation::codec::{BatchCodec, PAYLOAD_PREAMBLE};
use crate::common;

/// Encoding, echoing and decoding gives back every source keyed by index
#[test]
fn test_encodeEchoDecode_withParsedSrt_shouldRecoverSourcesByIndex() {
    let parsed = SubtitleParser::parse(&common::srt_document(12));
    let payload = BatchCodec::encode(&parsed.units, "guide");

    let reply = MockProvider::echo_reply(&payload.user);
    let mapping = BatchCodec::decode(&reply);

    assert_eq!(mapping.len(), 12);
    for unit in &parsed.units {
        assert_eq!(mapping[&unit.index], format!("{}{}", ECHO_PREFIX, unit.source_text));
    }
}

#[test]
fn test_encode_withGuide_shouldPutGuideInSystemMessageOnly() {
    let parsed = SubtitleParser::parse("1\tHello");
    let payload = BatchCodec::encode(&parsed.units, "Be concise.");

    assert_eq!(payload.system, "Be concise.");
    assert_eq!(payload.user, format!("{}1\tHello", PAYLOAD_PREAMBLE));
}

#[test]
fn test_decode_withNumberedProse_shouldOnlyTakeStrictLines() {
    let reply = "Here are the translations:\n1. Bonjour\n2 - Salut\n3: Coucou\n  4:Allô";
    let mapping = BatchCodec::decode(reply);

    assert_eq!(mapping.keys().copied().collect::<Vec<_>>(), vec![3, 4]);
    assert_eq!(mapping[&4], "Allô");
}

#[test]
fn test_decode_withEmptyReply_shouldBeEmpty() {
    assert!(BatchCodec::decode("").is_empty());
    assert!(BatchCodec::decode("\r\n\r\n").is_empty());
}
