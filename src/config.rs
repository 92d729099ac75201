use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ChatError;
use crate::persona::{DEFAULT_PERSONA, Persona, PersonaCatalog};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TYPING_DELAY_MS: u64 = 50;
const KEY_PREFIX_LEN: usize = 6;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub preference: PreferenceConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PersonaConfig {
    /// Preset to start with. Defaults to the pizza order bot.
    pub name: Option<String>,
    /// Replaces the text of the preset chosen here. A preset picked on the
    /// command line keeps its own text.
    pub prompt: Option<String>,
    #[serde(default)]
    pub presets: Vec<Persona>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryConfig {
    /// Number of most recent turns sent with each request. Unbounded if unset.
    pub context_turns: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_animate")]
    pub animate: bool,
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            animate: default_animate(),
            typing_delay_ms: default_typing_delay_ms(),
        }
    }
}

fn default_animate() -> bool {
    true
}

fn default_typing_delay_ms() -> u64 {
    DEFAULT_TYPING_DELAY_MS
}

#[derive(Debug, Deserialize, Default)]
pub struct PreferenceConfig {
    pub language: Option<String>,
}

impl PreferenceConfig {
    pub fn detect_lang(&self) -> String {
        // Prefer the configured preference
        if let Some(lang) = &self.language {
            return lang.clone();
        }
        // Infer from LANG environment variable, e.g. "zh_CN.UTF-8" -> "zh-CN"
        if let Ok(lang) = env::var("LANG") {
            let lang_code = lang.split('.').next().unwrap_or(&lang);
            return lang_code.replace('_', "-");
        }
        "en-US".to_string()
    }
}

/// API key held for the process lifetime. Never printed in full.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(ChatError::configuration("API key is empty"));
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ChatError::configuration(
                "API key is malformed (contains whitespace or non-ASCII characters)",
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First six characters followed by an ellipsis. Keys too short to
    /// reveal a prefix safely are fully masked.
    pub fn masked_prefix(&self) -> String {
        if self.0.chars().count() <= KEY_PREFIX_LEN {
            return "***".to_string();
        }
        let prefix: String = self.0.chars().take(KEY_PREFIX_LEN).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked_prefix()).finish()
    }
}

/// Immutable per-session settings. Switching persona means a new session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub persona_name: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub context_turns: Option<usize>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub persona: Option<String>,
    pub persona_prompt: Option<String>,
    pub model: Option<String>,
}

pub fn validate_model(model: &str) -> Result<(), ChatError> {
    if model.trim().is_empty() {
        return Err(ChatError::configuration("model identifier is empty"));
    }
    if model.chars().any(char::is_whitespace) {
        return Err(ChatError::configuration(format!(
            "unsupported model identifier '{model}'"
        )));
    }
    Ok(())
}

impl Config {
    pub fn load() -> Result<Self> {
        // 1. Check path specified by environment variable
        if let Ok(path) = env::var("PIZZACHAT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        // 2. Check XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("pizzachat").join("config.toml");
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        // 3. Fall back to default configuration
        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn catalog(&self) -> PersonaCatalog {
        PersonaCatalog::builtin().with_presets(&self.persona.presets)
    }

    pub fn credential(&self) -> Result<Credential, ChatError> {
        let raw = self
            .llm
            .api_key
            .clone()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                ChatError::configuration(
                    "OPENAI_API_KEY is required (set via config file or environment variable)",
                )
            })?;
        Credential::parse(&raw)
    }

    pub fn model(&self, overrides: &Overrides) -> String {
        overrides
            .model
            .clone()
            .or_else(|| self.llm.model.clone())
            .unwrap_or_else(|| env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()))
    }

    pub fn base_url(&self) -> String {
        self.llm.base_url.clone().unwrap_or_else(|| {
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn max_retries(&self) -> u32 {
        self.llm.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn session_config(&self, overrides: &Overrides) -> Result<SessionConfig, ChatError> {
        let catalog = self.catalog();
        let name = overrides
            .persona
            .as_deref()
            .or(self.persona.name.as_deref())
            .unwrap_or(DEFAULT_PERSONA);
        let preset = catalog.get(name)?;

        // The config's custom prompt belongs to the config's preset; a preset
        // picked on the command line brings its own text.
        let config_prompt = if overrides.persona.is_none() {
            self.persona.prompt.clone()
        } else {
            None
        };
        let system_prompt = overrides
            .persona_prompt
            .clone()
            .or(config_prompt)
            .unwrap_or_else(|| preset.prompt.clone());

        let model = self.model(overrides);
        validate_model(&model)?;

        if self.history.context_turns == Some(0) {
            return Err(ChatError::configuration(
                "history.context_turns must be at least 1",
            ));
        }

        let temperature = self.llm.temperature.unwrap_or(0.0);
        if !temperature.is_finite() {
            return Err(ChatError::configuration(format!(
                "llm.temperature must be a finite number, got {temperature}"
            )));
        }

        Ok(SessionConfig {
            persona_name: preset.name.clone(),
            system_prompt,
            model,
            temperature: temperature.clamp(0.0, 1.0),
            context_turns: self.history.context_turns,
        })
    }
}
