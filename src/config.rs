use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Environment variable not set: ${0}")]
    MissingEnvVar(String),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    pub nlu: NluConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// Page access token for the Graph API (supports ${ENV_VAR} expansion)
    pub page_access_token: String,
    /// Token echoed back during the webhook verification handshake
    pub verify_token: String,
}

// ---------------------------------------------------------------------------
// NLU
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct NluConfig {
    /// NLU service access token (supports ${ENV_VAR} expansion)
    pub access_token: String,
    #[serde(default = "default_nlu_language")]
    pub language: String,
    #[serde(default = "default_nlu_endpoint")]
    pub endpoint: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Pause between paced outbound messages, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// NLU sessions idle longer than this are evicted
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_nlu_language() -> String {
    "en".to_string()
}

fn default_nlu_endpoint() -> String {
    "https://api.api.ai/v1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_pacing_ms() -> u64 {
    200
}

fn default_db_path() -> String {
    "~/.coverbot/coverbot.db".to_string()
}

fn default_session_ttl_minutes() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Expand `~` to home directory in a path string.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${VAR_NAME}` patterns in a string using environment variables.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut result = input.to_string();
    // Collect captures first to avoid borrow issues
    let captures: Vec<(String, String)> = re
        .captures_iter(input)
        .map(|cap| (cap[0].to_string(), cap[1].to_string()))
        .collect();
    for (full_match, var_name) in captures {
        let value = std::env::var(&var_name)
            .map_err(|_| ConfigError::MissingEnvVar(var_name.clone()))?;
        result = result.replace(&full_match, &value);
    }
    Ok(result)
}

/// Default config directory: ~/.coverbot/
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".coverbot")
}

/// Load config from `~/.coverbot/config.toml` (or a custom path).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => config_dir().join("config.toml"),
    };

    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path));
    }

    let raw = std::fs::read_to_string(&config_path)?;
    parse_config(&raw)
}

/// Parse a config string (after reading from file).
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let expanded = expand_env_vars(raw)?;
    let config: Config = toml::from_str(&expanded)?;
    Ok(config)
}

impl Config {
    /// Resolve the database path.
    pub fn db_path(&self) -> PathBuf {
        expand_tilde(&self.persistence.db_path)
    }

    pub fn pacing(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delivery.pacing_ms)
    }

    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session.ttl_minutes * 60)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[platform]
page_access_token = "page-token"
verify_token = "verify-me"

[nlu]
access_token = "nlu-token"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.platform.page_access_token, "page-token");
        assert_eq!(config.platform.verify_token, "verify-me");
        assert_eq!(config.nlu.access_token, "nlu-token");
        assert_eq!(config.nlu.language, "en");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.delivery.pacing_ms, 200);
        assert_eq!(config.session.ttl_minutes, 60);
        assert_eq!(config.persistence.db_path, "~/.coverbot/coverbot.db");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[platform]
page_access_token = "page-token"
verify_token = "verify-me"

[nlu]
access_token = "nlu-token"
language = "vi"
endpoint = "https://nlu.example.com/v1"

[server]
port = 8080
bind = "127.0.0.1"

[delivery]
pacing_ms = 350

[persistence]
db_path = "/tmp/test.db"

[session]
ttl_minutes = 15
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.nlu.language, "vi");
        assert_eq!(config.nlu.endpoint, "https://nlu.example.com/v1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.delivery.pacing_ms, 350);
        assert_eq!(config.persistence.db_path, "/tmp/test.db");
        assert_eq!(config.session_ttl(), std::time::Duration::from_secs(900));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("COVERBOT_TEST_TOKEN", "expanded-value");
        let toml = r#"
[platform]
page_access_token = "${COVERBOT_TEST_TOKEN}"
verify_token = "v"

[nlu]
access_token = "n"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.platform.page_access_token, "expanded-value");
        std::env::remove_var("COVERBOT_TEST_TOKEN");
    }

    #[test]
    fn test_missing_env_var() {
        let toml = r#"
[platform]
page_access_token = "${COVERBOT_NONEXISTENT_VAR}"
verify_token = "v"

[nlu]
access_token = "n"
"#;
        let err = parse_config(toml).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnvVar(ref v) if v == "COVERBOT_NONEXISTENT_VAR")
        );
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/.coverbot/config.toml");
        assert!(path.to_str().unwrap().contains(".coverbot/config.toml"));
        assert!(!path.to_str().unwrap().starts_with("~"));

        let abs = expand_tilde("/absolute/path");
        assert_eq!(abs, PathBuf::from("/absolute/path"));
    }
}
