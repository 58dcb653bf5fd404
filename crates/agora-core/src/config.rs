use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgoraError, Result};
use crate::types::{ChatMode, ModelTier};

/// Top-level Agora configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub heavy: HeavyConfig,
}

/// Concrete models behind each tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub fast: ModelConfig,
    /// High-capability model. Agents on the pro tier use `fast` when unset.
    #[serde(default)]
    pub pro: Option<ModelConfig>,
}

impl ModelsConfig {
    /// Resolve the model configuration for a tier.
    pub fn for_tier(&self, tier: ModelTier) -> &ModelConfig {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Pro => self.pro.as_ref().unwrap_or(&self.fast),
        }
    }
}

/// Normal chat mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Prior turns sent in normal mode (0 = whole conversation).
    #[serde(default)]
    pub context_messages: usize,
    /// Mode the client starts in.
    #[serde(default)]
    pub mode: ChatMode,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            context_messages: 0,
            mode: ChatMode::Normal,
        }
    }
}

/// Heavy mode settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeavyConfig {
    /// Path to an agent preset JSON file. The built-in graph is used when unset.
    #[serde(default)]
    pub preset: Option<String>,
    /// Print every agent's response, not just the final answer.
    #[serde(default)]
    pub show_agent_responses: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_provider() -> String { "anthropic".to_string() }
fn default_max_tokens() -> u32 { 8192 }
fn default_temperature() -> f32 { 0.0 }

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra_headers: HashMap::new(),
            retry: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| AgoraError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded)
            .map_err(|e| AgoraError::Config(e.to_string()))
    }

    /// Minimal config using a single model for both tiers.
    pub fn with_model(model: ModelConfig) -> Self {
        Self {
            models: ModelsConfig {
                fast: model,
                pro: None,
            },
            chat: ChatConfig::default(),
            heavy: HeavyConfig::default(),
        }
    }

    /// Resolve the preset path, if any (expand ~).
    pub fn preset_path(&self) -> Option<PathBuf> {
        self.heavy.preset.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
