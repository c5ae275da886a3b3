//! Configuration loading and defaults for chatstream.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::ToolDef;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TEMPERATURE: f32 = 2.0;

// === Provider Presets ===

/// Defaults for a known OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    /// Conventional environment variable holding the provider's key.
    pub api_key_env: Option<&'static str>,
}

pub const PROVIDER_PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o-mini",
        api_key_env: Some("OPENAI_API_KEY"),
    },
    ProviderPreset {
        name: "deepseek",
        base_url: "https://api.deepseek.com",
        default_model: "deepseek-chat",
        api_key_env: Some("DEEPSEEK_API_KEY"),
    },
    ProviderPreset {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "openai/gpt-4o-mini",
        api_key_env: Some("OPENROUTER_API_KEY"),
    },
    ProviderPreset {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        default_model: "llama3.1",
        api_key_env: None,
    },
];

/// Look up a preset by (case-insensitive) name.
#[must_use]
pub fn provider_preset(name: &str) -> Option<&'static ProviderPreset> {
    let name = name.trim();
    PROVIDER_PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

// === Types ===

/// Configuration as written in files, environment and flags. Every field is
/// optional; defaults are applied when resolving.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_completions_path: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub tools_file: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(flatten)]
    base: Config,
    profiles: Option<HashMap<String, Config>>,
}

/// Fully resolved settings consumed by [`crate::client::ChatClient`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub completions_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolDef>,
    pub connect_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Minimal configuration for a single endpoint, with default sampling.
    pub fn new(completions_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            completions_url: completions_url.into(),
            api_key: None,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            tools: Vec::new(),
            connect_timeout: None,
        }
    }
}

// === Config Loading ===

impl Config {
    /// Load configuration from disk, then layer the environment and finally
    /// `overrides` (command-line flags) on top.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(path: Option<PathBuf>, profile: Option<&str>, overrides: Config) -> Result<Self> {
        let path = path.map(expand_pathbuf).or_else(default_config_path);
        let mut config = match path.as_ref() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml_str(&contents, profile)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            _ => {
                if let Some(name) = profile {
                    anyhow::bail!("Profile '{name}' requested but no config file was found");
                }
                Config::default()
            }
        };

        apply_env_overrides(&mut config, overrides.provider.as_deref());
        let config = config.merge(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, applying the named profile on top of the base
    /// table.
    pub fn from_toml_str(contents: &str, profile: Option<&str>) -> Result<Self> {
        let parsed: ConfigFile = toml::from_str(contents)?;
        apply_profile(parsed, profile)
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    #[must_use]
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            provider: overrides.provider.or(self.provider),
            api_key: overrides.api_key.or(self.api_key),
            base_url: overrides.base_url.or(self.base_url),
            chat_completions_path: overrides
                .chat_completions_path
                .or(self.chat_completions_path),
            model: overrides.model.or(self.model),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            temperature: overrides.temperature.or(self.temperature),
            system_prompt: overrides.system_prompt.or(self.system_prompt),
            tools_file: overrides.tools_file.or(self.tools_file),
            connect_timeout_secs: overrides.connect_timeout_secs.or(self.connect_timeout_secs),
        }
    }

    /// Validate field values that would otherwise fail later at request time.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref key) = self.api_key
            && key.trim().is_empty()
        {
            anyhow::bail!("api_key cannot be empty string");
        }
        if let Some(provider) = self.provider.as_deref()
            && provider_preset(provider).is_none()
        {
            let known = PROVIDER_PRESETS
                .iter()
                .map(|preset| preset.name)
                .collect::<Vec<_>>()
                .join(", ");
            anyhow::bail!("Unknown provider '{provider}': expected one of {known}.");
        }
        if let Some(temperature) = self.temperature
            && !(temperature.is_finite() && (0.0..=MAX_TEMPERATURE).contains(&temperature))
        {
            anyhow::bail!(
                "Invalid temperature {temperature}: expected a value between 0.0 and {MAX_TEMPERATURE:.1}."
            );
        }
        if self.max_tokens == Some(0) {
            anyhow::bail!("max_tokens must be greater than zero");
        }
        if let Some(model) = self.model.as_deref()
            && model.trim().is_empty()
        {
            anyhow::bail!("model cannot be empty string");
        }
        Ok(())
    }

    /// The selected provider preset.
    #[must_use]
    pub fn preset(&self) -> &'static ProviderPreset {
        self.provider
            .as_deref()
            .and_then(provider_preset)
            .or_else(|| provider_preset(DEFAULT_PROVIDER))
            .unwrap_or(&PROVIDER_PRESETS[0])
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(self.preset().base_url);
        base.trim().trim_end_matches('/').to_string()
    }

    /// Full chat-completions endpoint URL.
    #[must_use]
    pub fn completions_url(&self) -> String {
        let path = self
            .chat_completions_path
            .as_deref()
            .unwrap_or(DEFAULT_CHAT_COMPLETIONS_PATH)
            .trim();
        if path.starts_with('/') {
            format!("{}{path}", self.base_url())
        } else {
            format!("{}/{path}", self.base_url())
        }
    }

    #[must_use]
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.preset().default_model.to_string())
    }

    /// API key from config, falling back to the provider's conventional
    /// environment variable for configs built without [`Config::load`].
    /// `None` means requests go out unauthenticated.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.clone()
            && !key.trim().is_empty()
        {
            return Some(key);
        }
        self.preset()
            .api_key_env
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Resolve the tools file path, if one is configured.
    #[must_use]
    pub fn tools_path(&self) -> Option<PathBuf> {
        self.tools_file.as_deref().map(expand_path)
    }

    /// Produce the engine configuration, loading tool definitions from disk.
    pub fn resolve(&self) -> Result<EngineConfig> {
        let tools = match self.tools_path() {
            Some(path) => load_tools(&path)?,
            None => Vec::new(),
        };
        Ok(EngineConfig {
            completions_url: self.completions_url(),
            api_key: self.api_key(),
            model: self.model(),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            tools,
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
        })
    }
}

/// Read a JSON array of tool definitions. Each `parameters` schema is kept as
/// raw JSON text.
pub fn load_tools(path: &Path) -> Result<Vec<ToolDef>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tools file: {}", path.display()))?;
    let tools: Vec<ToolDef> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tools file: {}", path.display()))?;
    if let Some(tool) = tools.iter().find(|tool| tool.name.trim().is_empty()) {
        anyhow::bail!(
            "Tool with description '{}' in {} has an empty name",
            tool.description,
            path.display()
        );
    }
    Ok(tools)
}

// === Defaults ===

fn default_config_path() -> Option<PathBuf> {
    env_config_path().or_else(home_config_path)
}

fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatstream").join("config.toml"))
}

fn env_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHATSTREAM_CONFIG_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(expand_path(trimmed));
        }
    }
    None
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    if let Some(raw) = path.to_str() {
        return expand_path(raw);
    }
    path
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

// === Environment Overrides ===

/// `provider_override` is the provider chosen on the command line, which
/// decides whose conventional key variable applies.
fn apply_env_overrides(config: &mut Config, provider_override: Option<&str>) {
    if let Ok(value) = std::env::var("CHATSTREAM_PROVIDER") {
        config.provider = Some(value);
    }
    let preset = provider_override
        .or(config.provider.as_deref())
        .unwrap_or(DEFAULT_PROVIDER);
    if let Some(key) = provider_preset(preset)
        .and_then(|preset| preset.api_key_env)
        .and_then(|var| std::env::var(var).ok())
        .filter(|key| !key.trim().is_empty())
    {
        config.api_key = Some(key);
    }
    if let Ok(value) = std::env::var("CHATSTREAM_API_KEY") {
        config.api_key = Some(value);
    }
    if let Ok(value) = std::env::var("CHATSTREAM_BASE_URL") {
        config.base_url = Some(value);
    }
    if let Ok(value) = std::env::var("CHATSTREAM_MODEL") {
        config.model = Some(value);
    }
}

fn apply_profile(config: ConfigFile, profile: Option<&str>) -> Result<Config> {
    let Some(profile_name) = profile else {
        return Ok(config.base);
    };
    let profiles = config.profiles.as_ref();
    match profiles.and_then(|profiles| profiles.get(profile_name)) {
        Some(override_cfg) => Ok(config.base.merge(override_cfg.clone())),
        None => {
            let available = profiles
                .map(|profiles| {
                    let mut keys = profiles.keys().cloned().collect::<Vec<_>>();
                    keys.sort();
                    if keys.is_empty() {
                        "none".to_string()
                    } else {
                        keys.join(", ")
                    }
                })
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!("Profile '{profile_name}' not found. Available profiles: {available}")
        }
    }
}
