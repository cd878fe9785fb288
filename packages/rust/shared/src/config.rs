//! Application configuration for keyplan.
//!
//! User config lives at `~/.keyplan/keyplan.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KeyplanError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "keyplan.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".keyplan";

/// Largest batch the metrics provider accepts in one request.
pub const PROVIDER_BATCH_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// Config structs (matching keyplan.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Keyword metrics provider settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Gemini settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Keyword volume endpoint (HTTP POST, one request per batch).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Google Ads language constant (1005 = Japanese).
    #[serde(default = "default_language_constant")]
    pub language_constant: String,

    /// Google Ads geo target constants (2392 = Japan).
    #[serde(default = "default_geo_targets")]
    pub geo_target_constants: Vec<String>,

    /// Maximum keywords per request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_metrics_timeout")]
    pub timeout_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            language_constant: default_language_constant(),
            geo_target_constants: default_geo_targets(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_metrics_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api-three-gilt-37.vercel.app/api/get-keyword-volumes".into()
}
fn default_language_constant() -> String {
    "1005".into()
}
fn default_geo_targets() -> Vec<String> {
    vec!["2392".into()]
}
fn default_chunk_size() -> usize {
    PROVIDER_BATCH_LIMIT
}
fn default_metrics_timeout() -> u64 {
    30
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL, up to and including the version segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for directions and keyword group skeletons.
    #[serde(default = "default_strategy_model")]
    pub strategy_model: String,

    /// Model used for article writing.
    #[serde(default = "default_article_model")]
    pub article_model: String,

    /// Imagen model used for thumbnail backgrounds.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            strategy_model: default_strategy_model(),
            article_model: default_article_model(),
            image_model: default_image_model(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_strategy_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_article_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_image_model() -> String {
    "imagen-4.0-generate-001".into()
}
fn default_gemini_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Metrics options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime metrics provider options, validated from the config file.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    /// Parsed endpoint URL.
    pub endpoint: Url,
    /// Language targeting sent with every batch.
    pub language_constant: String,
    /// Geo targeting sent with every batch.
    pub geo_target_constants: Vec<String>,
    /// Keywords per batch, `1..=PROVIDER_BATCH_LIMIT`.
    pub chunk_size: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl TryFrom<&AppConfig> for MetricsOptions {
    type Error = KeyplanError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let metrics = &config.metrics;
        let endpoint = Url::parse(&metrics.endpoint).map_err(|e| {
            KeyplanError::config(format!("invalid metrics endpoint '{}': {e}", metrics.endpoint))
        })?;

        if metrics.chunk_size == 0 || metrics.chunk_size > PROVIDER_BATCH_LIMIT {
            return Err(KeyplanError::config(format!(
                "metrics.chunk_size must be between 1 and {PROVIDER_BATCH_LIMIT}, got {}",
                metrics.chunk_size
            )));
        }

        Ok(Self {
            endpoint,
            language_constant: metrics.language_constant.clone(),
            geo_target_constants: metrics.geo_target_constants.clone(),
            chunk_size: metrics.chunk_size,
            timeout_secs: metrics.timeout_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.keyplan/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| KeyplanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.keyplan/keyplan.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KeyplanError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| KeyplanError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| KeyplanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| KeyplanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| KeyplanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the Gemini API key from the env var named in the config.
///
/// Called once at process start; the key is then handed to clients as a value.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.gemini.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(KeyplanError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://aistudio.google.com/apikey"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("language_constant"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[metrics]
endpoint = "http://localhost:8080/volumes"
geo_target_constants = ["2840"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.metrics.endpoint, "http://localhost:8080/volumes");
        assert_eq!(config.metrics.geo_target_constants, vec!["2840".to_string()]);
        assert_eq!(config.metrics.language_constant, "1005");
        assert_eq!(config.metrics.chunk_size, 20);
        assert_eq!(config.gemini.strategy_model, "gemini-2.5-flash");
        assert_eq!(config.gemini.image_model, "imagen-4.0-generate-001");
    }

    #[test]
    fn metrics_options_from_default_config() {
        let app = AppConfig::default();
        let opts = MetricsOptions::try_from(&app).expect("valid defaults");
        assert_eq!(opts.chunk_size, PROVIDER_BATCH_LIMIT);
        assert_eq!(opts.geo_target_constants, vec!["2392".to_string()]);
        assert_eq!(opts.endpoint.scheme(), "https");
    }

    #[test]
    fn metrics_options_rejects_bad_chunk_size() {
        let mut app = AppConfig::default();
        app.metrics.chunk_size = 0;
        assert!(MetricsOptions::try_from(&app).is_err());

        app.metrics.chunk_size = 21;
        let err = MetricsOptions::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn metrics_options_rejects_bad_endpoint() {
        let mut app = AppConfig::default();
        app.metrics.endpoint = "not a url".into();
        let err = MetricsOptions::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("invalid metrics endpoint"));
    }

    #[test]
    fn api_key_resolution() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.gemini.api_key_env = "KP_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
