//! Application configuration for Stargazer.
//!
//! User config lives at `~/.stargazer/stargazer.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file — each section names the environment
//! variable that holds the credential.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StargazerError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stargazer.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stargazer";

// ---------------------------------------------------------------------------
// Config structs (matching stargazer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// DeepWiki docs service settings.
    #[serde(default)]
    pub deepwiki: DeepWikiConfig,

    /// OpenRouter (LLM backend) settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Feishu webhook settings.
    #[serde(default)]
    pub feishu: FeishuConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum starred repositories requested per cycle.
    #[serde(default = "default_star_limit")]
    pub star_limit: u32,

    /// Directory for final documents and their sidecars.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Path to the processing-state ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Optional directory where per-repository workspaces are mirrored
    /// for debugging. Empty string disables the mirror.
    #[serde(default)]
    pub workspace_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            star_limit: default_star_limit(),
            output_dir: default_output_dir(),
            ledger_path: default_ledger_path(),
            workspace_dir: String::new(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}
fn default_star_limit() -> u32 {
    10
}
fn default_output_dir() -> String {
    "~/.stargazer/docs".into()
}
fn default_ledger_path() -> String {
    "~/.stargazer/ledger.json".into()
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub REST API base URL.
    #[serde(default = "default_github_api")]
    pub api_url: String,

    /// Raw content host used for README fetches.
    #[serde(default = "default_github_raw")]
    pub raw_url: String,

    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api(),
            raw_url: default_github_raw(),
            token_env: default_github_token_env(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}
fn default_github_raw() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[deepwiki]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepWikiConfig {
    /// Base URL of the DeepWiki docs service.
    #[serde(default = "default_deepwiki_url")]
    pub base_url: String,
}

impl Default for DeepWikiConfig {
    fn default() -> Self {
        Self {
            base_url: default_deepwiki_url(),
        }
    }
}

fn default_deepwiki_url() -> String {
    "http://localhost:3000".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Chat-completions base URL.
    #[serde(default = "default_openrouter_url")]
    pub base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for both refinement calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// Byte budget for refinement context (prompt inputs are truncated to
    /// fit the model's context window).
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            context_budget: default_context_budget(),
        }
    }
}

fn default_openrouter_url() -> String {
    // Trailing slash matters: Url::join would otherwise drop the /api segment.
    "https://openrouter.ai/api/".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_context_budget() -> usize {
    48_000
}

/// `[feishu]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeishuConfig {
    /// Name of the env var holding the webhook URL. Unset env var disables
    /// notifications.
    #[serde(default = "default_webhook_env")]
    pub webhook_env: String,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            webhook_env: default_webhook_env(),
        }
    }
}

fn default_webhook_env() -> String {
    "FEISHU_WEBHOOK_URL".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stargazer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StargazerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stargazer/stargazer.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| StargazerError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StargazerError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StargazerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StargazerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StargazerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Check that the required credential env vars are set and non-empty.
///
/// The GitHub token and the OpenRouter key are required at startup; the
/// Feishu webhook is optional (notifications are disabled when unset).
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    for (label, var_name) in [
        ("GitHub token", config.github.token_env.as_str()),
        ("OpenRouter API key", config.openrouter.api_key_env.as_str()),
    ] {
        match std::env::var(var_name) {
            Ok(val) if !val.is_empty() => {}
            _ => {
                return Err(StargazerError::config(format!(
                    "{label} not found. Set the {var_name} environment variable."
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("poll_interval_secs"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.poll_interval_secs, 60);
        assert_eq!(parsed.defaults.star_limit, 10);
        assert_eq!(parsed.github.api_url, "https://api.github.com");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
poll_interval_secs = 300
output_dir = "/srv/stargazer/docs"

[deepwiki]
base_url = "http://deepwiki.internal:8080"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.poll_interval_secs, 300);
        assert_eq!(config.defaults.output_dir, "/srv/stargazer/docs");
        // Unspecified fields fall back to defaults.
        assert_eq!(config.defaults.star_limit, 10);
        assert_eq!(config.deepwiki.base_url, "http://deepwiki.internal:8080");
        assert_eq!(config.feishu.webhook_env, "FEISHU_WEBHOOK_URL");
    }

    #[test]
    fn default_backend_url_keeps_api_segment_when_joined() {
        let config = AppConfig::default();
        assert!(config.openrouter.base_url.ends_with('/'));
        // The /api segment must survive a relative join.
        assert_eq!(
            format!("{}v1/chat/completions", config.openrouter.base_url),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn expand_home_passthrough_for_absolute() {
        assert_eq!(
            expand_home("/var/lib/stargazer"),
            PathBuf::from("/var/lib/stargazer")
        );
    }

    #[test]
    fn credential_validation_fails_on_missing_var() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.github.token_env = "SG_TEST_NONEXISTENT_TOKEN_98765".into();
        let result = validate_credentials(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("GitHub token"));
    }
}
