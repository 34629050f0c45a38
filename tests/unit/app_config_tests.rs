/*!
 * Tests for configuration loading and validation
 */

use std::time::Duration;
use subbatch::app_config::{Config, LogLevel, MODEL_PRESETS, resolve_model_id};
use crate::common;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.concurrency, 3);
    let reloaded = Config::from_file(&path).unwrap();
    assert_eq!(reloaded.model, config.model);
    assert_eq!(reloaded.guide_prompt, config.guide_prompt);
}

#[test]
fn test_fromFile_withPartialJson_shouldKeepGivenValues() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{ "endpoint": "http://gateway:8045/v1", "api_key": "sk-x", "model": "Gemini 2.5 Pro", "timeout_secs": 90, "log_level": "debug" }"#,
    ).unwrap();

    let config = Config::from_file(&path).unwrap();
    let run = config.run_config();

    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(run.model_id, "gemini-2.5-pro");
    assert_eq!(run.endpoint, "http://gateway:8045/v1");
    assert_eq!(run.timeout, Some(Duration::from_secs(90)));
}

#[test]
fn test_fromFile_withBrokenJson_shouldFailWithPath() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json").unwrap();

    let error = Config::from_file(&path).unwrap_err();
    assert!(error.to_string().contains("conf.json"));
}

#[test]
fn test_validate_withZeroConcurrency_shouldFail() {
    let config = Config { api_key: "sk".to_string(), concurrency: 0, ..Default::default() };
    assert!(config.validate().is_err());
}

#[test]
fn test_modelPresets_shouldResolveEveryDisplayName() {
    for (display_name, model_id) in MODEL_PRESETS {
        assert_eq!(resolve_model_id(display_name), *model_id);
    }
}

#[test]
fn test_renderedGuidePrompt_shouldFillTargetLanguage() {
    let config = Config {
        guide_prompt: "Translate into {target_language}.".to_string(),
        target_language: "German".to_string(),
        ..Default::default()
    };
    assert_eq!(config.rendered_guide_prompt(), "Translate into German.");
}
