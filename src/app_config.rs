use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::translation::core::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_TEMPERATURE, RunConfig};

// Application configuration module
// This module handles the application configuration including loading,
// validating and saving configuration settings.

/// Environment variable that may carry the API key
pub const API_KEY_ENV: &str = "SUBBATCH_API_KEY";

/// Placeholder replaced by the target language in the guide prompt
pub const TARGET_LANGUAGE_PLACEHOLDER: &str = "{target_language}";

/// Known models: display name and model id
pub const MODEL_PRESETS: &[(&str, &str)] = &[
    ("Gemini 3 Flash", "gemini-3-flash"),
    ("Gemini 3 Pro High", "gemini-3-pro-high"),
    ("Gemini 3 Pro Low", "gemini-3-pro-low"),
    ("Gemini 3 Pro (Image)", "gemini-3-pro-image"),
    ("Gemini 2.5 Flash", "gemini-2.5-flash"),
    ("Gemini 2.5 Flash Lite", "gemini-2.5-flash-lite"),
    ("Gemini 2.5 Pro", "gemini-2.5-pro"),
    ("Gemini 2.5 Flash (Thinking)", "gemini-2.5-flash-thinking"),
    ("Claude 4.5 Sonnet", "claude-sonnet-4-5"),
];

/// Map a preset display name to its id; anything else is taken as an id
pub fn resolve_model_id(name_or_id: &str) -> String {
    let wanted = name_or_id.trim();
    MODEL_PRESETS
        .iter()
        .find(|(display, id)| display.eq_ignore_ascii_case(wanted) || id.eq_ignore_ascii_case(wanted))
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| wanted.to_string())
}

/// Image-generation models do not answer with translated text
pub fn is_image_model(model_id: &str) -> bool {
    model_id.to_lowercase().contains("image")
}

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token; may be left empty and supplied through the environment
    #[serde(default)]
    pub api_key: String,

    /// Model display name or id
    #[serde(default = "default_model")]
    pub model: String,

    /// Language the subtitles are translated into
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// System prompt sent with every batch
    /// Placeholders: {target_language}
    #[serde(default = "default_guide_prompt")]
    pub guide_prompt: String,

    /// Lines per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds; none means the transport default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8045/v1".to_string()
}

fn default_model() -> String {
    MODEL_PRESETS[0].1.to_string()
}

fn default_target_language() -> String {
    "Vietnamese".to_string()
}

fn default_guide_prompt() -> String {
    "You are an expert subtitle translator.\n\
     Task: translate into {target_language}, naturally, in context and concisely enough for subtitles.\n\
     MANDATORY RULES:\n\
     - Keep the original order.\n\
     - Exactly one line per subtitle.\n\
     - Exact format: index: translated text\n\
     - No explanations, no extra lines, never change an index."
        .to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            target_language: default_target_language(),
            guide_prompt: default_guide_prompt(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            temperature: default_temperature(),
            timeout_secs: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Read a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Load the file, or write and return the defaults when it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Model id after resolving preset display names
    pub fn model_id(&self) -> String {
        resolve_model_id(&self.model)
    }

    /// Guide prompt with the target language filled in
    pub fn rendered_guide_prompt(&self) -> String {
        self.guide_prompt.replace(TARGET_LANGUAGE_PLACEHOLDER, self.target_language.trim())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("Batch size must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(anyhow!("Concurrency must be greater than 0"));
        }
        if self.guide_prompt.trim().is_empty() {
            return Err(anyhow!("Guide prompt cannot be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("Model cannot be empty"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(anyhow!("Endpoint cannot be empty"));
        }
        if self.api_key.trim().is_empty() {
            return Err(anyhow!(
                "API key is required: set it in the config file or the {} environment variable",
                API_KEY_ENV
            ));
        }

        let model_id = self.model_id();
        if is_image_model(&model_id) {
            warn!("Model '{}' is an image model and may not return translated text", model_id);
        }

        Ok(())
    }

    /// Snapshot of the settings a translation run needs
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            guide_prompt: self.rendered_guide_prompt(),
            model_id: self.model_id(),
            temperature: self.temperature,
            endpoint: self.endpoint.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}
