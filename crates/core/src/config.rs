use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    /// Whether the provider accepts a structured function catalog; false
    /// selects the text-pattern calling protocol.
    pub native_function_calling: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub context_ttl_secs: u64,
    pub knowledge_ttl_secs: u64,
    pub response_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Dialogue turns handed to the model, most recent first retained.
    pub history_window: usize,
    pub coupon_max_discount_pct: u8,
    pub coupon_validity_days: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                native_function_calling: false,
                timeout_secs: 30,
                max_retries: 2,
            },
            cache: CacheConfig {
                context_ttl_secs: 1800,
                knowledge_ttl_secs: 900,
                response_ttl_secs: 60,
            },
            pipeline: PipelineConfig {
                history_window: 10,
                coupon_max_discount_pct: 15,
                coupon_validity_days: 7,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    cache: Option<CachePatch>,
    pipeline: Option<PipelinePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    native_function_calling: Option<bool>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    context_ttl_secs: Option<u64>,
    knowledge_ttl_secs: Option<u64>,
    response_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    history_window: Option<usize>,
    coupon_max_discount_pct: Option<u8>,
    coupon_validity_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopmate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(native) = llm.native_function_calling {
                self.llm.native_function_calling = native;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(secs) = cache.context_ttl_secs {
                self.cache.context_ttl_secs = secs;
            }
            if let Some(secs) = cache.knowledge_ttl_secs {
                self.cache.knowledge_ttl_secs = secs;
            }
            if let Some(secs) = cache.response_ttl_secs {
                self.cache.response_ttl_secs = secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(window) = pipeline.history_window {
                self.pipeline.history_window = window;
            }
            if let Some(pct) = pipeline.coupon_max_discount_pct {
                self.pipeline.coupon_max_discount_pct = pct;
            }
            if let Some(days) = pipeline.coupon_validity_days {
                self.pipeline.coupon_validity_days = days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPMATE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("SHOPMATE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SHOPMATE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_NATIVE_FUNCTION_CALLING") {
            self.llm.native_function_calling =
                parse_bool("SHOPMATE_LLM_NATIVE_FUNCTION_CALLING", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOPMATE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SHOPMATE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_CACHE_CONTEXT_TTL_SECS") {
            self.cache.context_ttl_secs = parse_u64("SHOPMATE_CACHE_CONTEXT_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_CACHE_KNOWLEDGE_TTL_SECS") {
            self.cache.knowledge_ttl_secs = parse_u64("SHOPMATE_CACHE_KNOWLEDGE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPMATE_CACHE_RESPONSE_TTL_SECS") {
            self.cache.response_ttl_secs = parse_u64("SHOPMATE_CACHE_RESPONSE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPMATE_PIPELINE_HISTORY_WINDOW") {
            self.pipeline.history_window =
                parse_u64("SHOPMATE_PIPELINE_HISTORY_WINDOW", &value)? as usize;
        }
        if let Some(value) = read_env("SHOPMATE_PIPELINE_COUPON_MAX_DISCOUNT_PCT") {
            self.pipeline.coupon_max_discount_pct =
                parse_u32("SHOPMATE_PIPELINE_COUPON_MAX_DISCOUNT_PCT", &value)? as u8;
        }
        if let Some(value) = read_env("SHOPMATE_PIPELINE_COUPON_VALIDITY_DAYS") {
            self.pipeline.coupon_validity_days =
                parse_u32("SHOPMATE_PIPELINE_COUPON_VALIDITY_DAYS", &value)?;
        }

        let log_level =
            read_env("SHOPMATE_LOGGING_LEVEL").or_else(|| read_env("SHOPMATE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPMATE_LOGGING_FORMAT").or_else(|| read_env("SHOPMATE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_cache(&self.cache)?;
        validate_pipeline(&self.pipeline)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopmate.toml"), PathBuf::from("config/shopmate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("cache.context_ttl_secs", cache.context_ttl_secs),
        ("cache.knowledge_ttl_secs", cache.knowledge_ttl_secs),
        ("cache.response_ttl_secs", cache.response_ttl_secs),
    ] {
        if value == 0 || value > 86_400 {
            return Err(ConfigError::Validation(format!(
                "{name} must be in range 1..=86400"
            )));
        }
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.history_window == 0 || pipeline.history_window > 50 {
        return Err(ConfigError::Validation(
            "pipeline.history_window must be in range 1..=50".to_string(),
        ));
    }
    if pipeline.coupon_max_discount_pct == 0 || pipeline.coupon_max_discount_pct > 100 {
        return Err(ConfigError::Validation(
            "pipeline.coupon_max_discount_pct must be in range 1..=100".to_string(),
        ));
    }
    if pipeline.coupon_validity_days == 0 || pipeline.coupon_validity_days > 365 {
        return Err(ConfigError::Validation(
            "pipeline.coupon_validity_days must be in range 1..=365".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{interpolate_env_vars, AppConfig, ConfigError, LlmProvider, LogFormat};

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.history_window, 10);
        assert_eq!(config.pipeline.coupon_max_discount_pct, 15);
        assert_eq!(config.pipeline.coupon_validity_days, 7);
    }

    #[test]
    fn openai_requires_api_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.api_key = None;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.llm.api_key = Some("sk-test".to_string().into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_ttls_are_rejected() {
        let mut config = AppConfig::default();
        config.cache.response_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn provider_and_format_parse_from_str() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("gpt".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn interpolation_replaces_known_vars_and_rejects_unterminated() {
        std::env::set_var("SHOPMATE_TEST_INTERP", "abc123");
        let out = interpolate_env_vars("api_key = \"${SHOPMATE_TEST_INTERP}\"").unwrap();
        assert_eq!(out, "api_key = \"abc123\"");

        assert!(matches!(
            interpolate_env_vars("api_key = \"${OOPS"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
    }
}
