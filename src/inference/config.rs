//! Model configuration loading.
//!
//! Reads `ticketlens.yaml` and resolves environment variables. Config is
//! the single source of truth for the model endpoint, credentials, and
//! sampling defaults. When no config file exists, the built-in defaults
//! target the hosted OpenAI endpoint with `OPENAI_API_KEY` from the
//! environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

/// Name of the configuration file searched for.
const CONFIG_FILE_NAME: &str = "ticketlens.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// The model's runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent with every request (e.g., "gpt-4o-mini").
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible endpoint base URL, without the trailing route.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token. Supports `${VAR}` interpolation in the YAML.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the config file path.
///
/// Order: `TICKETLENS_CONFIG` env var, upward search from `start`, then
/// the platform config directory (`~/.config/ticketlens/` on Linux).
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("TICKETLENS_CONFIG") {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("ticketlens").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

/// Load and parse a model configuration file.
///
/// Performs environment-variable interpolation on the raw text before
/// parsing: `${VAR_NAME}` and `${VAR_NAME:-default}` are both supported.
pub fn load_model_config(path: &Path) -> Result<ModelConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to parse {}: {e}", path.display()),
    })
}

/// Resolve the effective configuration: explicit path, discovered file,
/// or built-in defaults.
pub fn resolve_model_config(explicit: Option<&Path>) -> Result<ModelConfig, InferenceError> {
    if let Some(path) = explicit {
        return load_model_config(path);
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match find_config_path(&cwd) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading model config");
            load_model_config(&path)
        }
        None => {
            tracing::info!("no ticketlens.yaml found, using built-in OpenAI defaults");
            Ok(ModelConfig::default())
        }
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__TEST_NONEXISTENT_VAR__");
        let input = "${__TEST_NONEXISTENT_VAR__:-gpt-4o-mini}";
        assert_eq!(interpolate_env_vars(input), "gpt-4o-mini");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__TEST_TICKETLENS_VAR__", "llama-3.1");
        let input = "${__TEST_TICKETLENS_VAR__:-gpt-4o-mini}";
        assert_eq!(interpolate_env_vars(input), "llama-3.1");
        std::env::remove_var("__TEST_TICKETLENS_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_parse_config_with_defaults() {
        let yaml = "model: gpt-4o\n";
        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_load_config_interpolates_api_key() {
        use std::io::Write;
        std::env::set_var("__TEST_TICKETLENS_KEY__", "sk-test-123");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model: gpt-4o-mini\nbase_url: https://api.openai.com/v1\napi_key: ${{__TEST_TICKETLENS_KEY__}}"
        )
        .unwrap();

        let config = load_model_config(file.path()).unwrap();
        assert_eq!(config.api_key, "sk-test-123");
        std::env::remove_var("__TEST_TICKETLENS_KEY__");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_model_config(Path::new("/nonexistent/ticketlens.yaml"));
        assert!(matches!(
            result,
            Err(InferenceError::ConfigError { .. })
        ));
    }
}
