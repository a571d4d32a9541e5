use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::language_utils;
use crate::translation::concurrency::ProviderProfile;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO), or `auto`
    pub source_language: String,

    /// Target language code (ISO, optionally with a region subtag)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Batching and validation settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
}

impl TranslationProvider {
    /// Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    /// Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    /// Environment variable consulted when no API key is configured
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env_var().is_some()
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    /// Service URL
    #[serde(default)]
    pub endpoint: String,

    /// Batches in flight at once (0 uses the provider default)
    #[serde(default)]
    pub concurrent_requests: usize,

    /// Aggregate source characters per batch (0 uses the provider default)
    #[serde(default)]
    pub max_chars_per_request: usize,

    /// Per-call timeout (0 uses the provider default)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Provider config with defaults
    pub fn new(provider: TranslationProvider) -> Self {
        let profile = ProviderProfile::for_provider(provider);
        let (model, endpoint) = match provider {
            TranslationProvider::Ollama => (default_ollama_model(), default_ollama_endpoint()),
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint()),
            TranslationProvider::Anthropic => (default_anthropic_model(), default_anthropic_endpoint()),
        };

        Self {
            provider_type: provider.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            concurrent_requests: profile.concurrent_requests,
            max_chars_per_request: profile.max_chars_per_batch,
            timeout_secs: profile.request_timeout.as_secs(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Extra instructions appended to the system prompt
    #[serde(default = "default_instructions")]
    pub instructions: Option<String>,

    /// Maximum attempts per unit, the first one included
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Wait after the first failed attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,

    /// Upper bound for a single backoff wait
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Pause before each batch admitted after the first concurrency window
    /// (unset uses the provider default)
    #[serde(default)]
    pub group_delay_ms: Option<u64>,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic, higher values more creative
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            instructions: default_instructions(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            group_delay_ms: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Batching and validation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Units per batch (0 uses the provider default)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Longest accepted source text, in characters
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Re-send items individually when a batch call fails
    #[serde(default = "default_true")]
    pub isolate_batch_failures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_text_length: default_max_text_length(),
            isolate_batch_failures: true,
        }
    }
}

/// Translation cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of entries
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry time-to-live
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval of the expired-entry sweep (0 disables it)
    #[serde(default = "default_cache_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
            cleanup_interval_secs: default_cache_cleanup_interval_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
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
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_retry_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_batch_size() -> usize {
    10
}

fn default_max_text_length() -> usize {
    10_000
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_cleanup_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_system_prompt() -> String {
    crate::translation::prompts::PromptTemplate::DOCUMENT_TRANSLATOR.to_string()
}

fn default_instructions() -> Option<String> {
    Some(
        "The text comes from presentation slides: keep titles short, keep bullet fragments as fragments, \
         and do not add punctuation that the source does not have."
            .to_string(),
    )
}

impl Config {
    /// Load the configuration at `path`, writing a default one when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).context(format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .context(format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .context(format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !language_utils::is_auto_detect(&self.source_language) {
            language_utils::validate_language_tag(&self.source_language)
                .context("Invalid source language")?;
        }
        language_utils::validate_language_tag(&self.target_language).context("Invalid target language")?;

        let provider = self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (set it in the config or {})",
                provider.display_name(),
                provider.api_key_env_var().unwrap_or_default()
            ));
        }

        let common = &self.translation.common;
        if common.retry_count == 0 {
            return Err(anyhow!("retry_count must be at least 1"));
        }
        if !(1.0..=10.0).contains(&common.retry_backoff_multiplier) {
            return Err(anyhow!("retry_backoff_multiplier must be between 1 and 10"));
        }
        if !(0.0..=2.0).contains(&common.temperature) {
            return Err(anyhow!("temperature must be between 0.0 and 2.0"));
        }
        if self.pipeline.max_text_length == 0 {
            return Err(anyhow!("max_text_length must be positive"));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(anyhow!("cache capacity must be positive when the cache is enabled"));
        }

        Ok(())
    }

    /// Retry budget and backoff schedule
    pub fn retry_policy(&self) -> crate::translation::RetryPolicy {
        let common = &self.translation.common;
        crate::translation::RetryPolicy {
            max_retries: common.retry_count,
            base_delay: Duration::from_millis(common.retry_backoff_ms),
            multiplier: common.retry_backoff_multiplier,
            max_delay: Duration::from_millis(common.max_retry_delay_ms),
        }
    }

    /// Units per batch, falling back to the provider profile
    pub fn batch_size(&self) -> usize {
        if self.pipeline.batch_size > 0 {
            self.pipeline.batch_size
        } else {
            self.translation.profile().batch_size
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            translation: TranslationConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Throughput defaults of the active provider
    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile::for_provider(self.provider)
    }

    pub fn optimal_concurrent_requests(&self) -> usize {
        let configured = self.get_active_provider_config().map(|p| p.concurrent_requests);
        self.profile().effective_concurrent_requests(configured)
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable configuration of the active provider, created when missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let position = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(position) => position,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[position]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the API key for the active provider, falling back to its environment variable
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        self.provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .map(|key| key.trim().to_string())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Get the max chars per batch for the active provider
    pub fn get_max_chars_per_request(&self) -> usize {
        match self.get_active_provider_config() {
            Some(p) if p.max_chars_per_request > 0 => p.max_chars_per_request,
            _ => self.profile().max_chars_per_batch,
        }
    }

    /// Get the per-call timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        match self.get_active_provider_config() {
            Some(p) if p.timeout_secs > 0 => Duration::from_secs(p.timeout_secs),
            _ => self.profile().request_timeout,
        }
    }

    /// Get the inter-group delay
    pub fn get_group_delay(&self) -> Duration {
        self.common
            .group_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.profile().group_delay)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
