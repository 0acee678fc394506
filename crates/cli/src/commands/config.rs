use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shopmate_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", "SHOPMATE_LLM_PROVIDER"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "SHOPMATE_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", "SHOPMATE_LLM_BASE_URL"),
    ));
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", api_key, source("llm.api_key", "SHOPMATE_LLM_API_KEY")));
    lines.push(render_line(
        "llm.native_function_calling",
        &config.llm.native_function_calling.to_string(),
        source("llm.native_function_calling", "SHOPMATE_LLM_NATIVE_FUNCTION_CALLING"),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "SHOPMATE_LLM_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "cache.context_ttl_secs",
        &config.cache.context_ttl_secs.to_string(),
        source("cache.context_ttl_secs", "SHOPMATE_CACHE_CONTEXT_TTL_SECS"),
    ));
    lines.push(render_line(
        "cache.knowledge_ttl_secs",
        &config.cache.knowledge_ttl_secs.to_string(),
        source("cache.knowledge_ttl_secs", "SHOPMATE_CACHE_KNOWLEDGE_TTL_SECS"),
    ));
    lines.push(render_line(
        "cache.response_ttl_secs",
        &config.cache.response_ttl_secs.to_string(),
        source("cache.response_ttl_secs", "SHOPMATE_CACHE_RESPONSE_TTL_SECS"),
    ));

    lines.push(render_line(
        "pipeline.history_window",
        &config.pipeline.history_window.to_string(),
        source("pipeline.history_window", "SHOPMATE_PIPELINE_HISTORY_WINDOW"),
    ));
    lines.push(render_line(
        "pipeline.coupon_max_discount_pct",
        &config.pipeline.coupon_max_discount_pct.to_string(),
        source("pipeline.coupon_max_discount_pct", "SHOPMATE_PIPELINE_COUPON_MAX_DISCOUNT_PCT"),
    ));
    lines.push(render_line(
        "pipeline.coupon_validity_days",
        &config.pipeline.coupon_validity_days.to_string(),
        source("pipeline.coupon_validity_days", "SHOPMATE_PIPELINE_COUPON_VALIDITY_DAYS"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "SHOPMATE_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "SHOPMATE_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("shopmate.toml"), PathBuf::from("config/shopmate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_resolve_through_tables() {
        let doc: toml::Value = "[llm]\nmodel = \"llama3.1\"".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "cache.response_ttl_secs"));
    }
}
