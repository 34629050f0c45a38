/*!
 * Tests for error types
 */

use subbatch::errors::{ProviderError, TranslationError};

#[test]
fn test_malformedBatch_display_shouldNameRangeAndRemedy() {
    let error = TranslationError::MalformedBatch {
        first: 101,
        last: 200,
        raw_reply: "garbage".to_string(),
    };
    let message = error.to_string();
    assert!(message.contains("101..200"));
    assert!(message.contains("batch size"));
}

#[test]
fn test_providerError_intoTranslationError_shouldWrap() {
    let error: TranslationError = ProviderError::RateLimitExceeded("slow down".to_string()).into();
    assert!(matches!(error, TranslationError::Provider(ProviderError::RateLimitExceeded(_))));
    assert!(error.to_string().contains("slow down"));
}

#[test]
fn test_apiError_display_shouldIncludeStatus() {
    let error = ProviderError::ApiError { status_code: 502, message: "bad gateway".to_string() };
    assert_eq!(error.to_string(), "API responded with error: 502 - bad gateway");
}
