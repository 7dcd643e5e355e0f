use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CHANNEL_PREFIX: &str = "room:";

/// Retry schedule for durable writes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of write attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * base_delay_ms` after failing.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given (1-based) attempt failed.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// The main configuration structure for Roomline clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the storage and realtime backend
    pub backend_url: String,

    /// API key sent with every backend request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Agent credited with realtime messages that name no sender
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Logging level
    pub log_level: String,

    /// Prefix prepended to a room id to form its realtime channel name
    pub channel_prefix: String,

    /// Durable write retry schedule
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            agent_id: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a YAML or JSON configuration file.
    /// * `backend_override` - Optional backend URL that wins over every other source.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the resolved
    /// configuration is invalid.
    pub fn load_config(
        config_path: Option<PathBuf>,
        backend_override: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Config::with_defaults();

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into()),
            };
        }

        // Environment only fills values the file left at their defaults
        let defaults = Config::with_defaults();
        if config.backend_url == defaults.backend_url {
            if let Ok(url) = env::var("ROOMLINE_BACKEND_URL") {
                config.backend_url = url;
            }
        }
        if config.api_key.is_none() {
            config.api_key = env::var("ROOMLINE_API_KEY").ok();
        }
        if config.agent_id.is_none() {
            config.agent_id = env::var("ROOMLINE_AGENT_ID").ok();
        }
        if config.log_level == defaults.log_level {
            if let Ok(level) = env::var("ROOMLINE_LOG_LEVEL") {
                config.log_level = level;
            }
        }

        if let Some(url) = backend_override {
            config.backend_url = url;
        }

        config.validate().map_err(|errors| errors.join("; "))?;
        Ok(config)
    }

    /// Parsed backend base URL.
    ///
    /// # Errors
    /// Returns an error if `backend_url` is not an absolute URL.
    pub fn backend_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.backend_url)
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(err) = self.backend_url() {
            errors.push(format!("Invalid backend URL '{}': {err}", self.backend_url));
        }

        if self.retry.max_attempts == 0 {
            errors.push("Invalid retry.max_attempts. Must be greater than 0.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            std::env::remove_var("ROOMLINE_BACKEND_URL");
            std::env::remove_var("ROOMLINE_API_KEY");
            std::env::remove_var("ROOMLINE_AGENT_ID");
            std::env::remove_var("ROOMLINE_LOG_LEVEL");
        }
    }

    #[test]
    fn test_config_with_defaults() {
        let config = Config::with_defaults();

        assert_eq!(config.backend_url, "http://localhost:54321");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.channel_prefix, "room:");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_after(1), Duration::from_millis(500));
        assert_eq!(retry.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    #[serial]
    fn test_load_config_with_environment_variables() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("ROOMLINE_BACKEND_URL", "https://db.example.com");
            std::env::set_var("ROOMLINE_API_KEY", "anon-key");
            std::env::set_var("ROOMLINE_AGENT_ID", "agent-9");
            std::env::set_var("ROOMLINE_LOG_LEVEL", "debug");
        }

        let config = Config::load_config(None, None).unwrap();

        assert_eq!(config.backend_url, "https://db.example.com");
        assert_eq!(config.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.agent_id.as_deref(), Some("agent-9"));
        assert_eq!(config.log_level, "debug");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_backend_override_precedence() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("ROOMLINE_BACKEND_URL", "https://env.example.com");
        }

        let config =
            Config::load_config(None, Some("https://flag.example.com".to_string())).unwrap();
        assert_eq!(config.backend_url, "https://flag.example.com");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_from_yaml_file() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("roomline.yaml");

        let yaml_content = r#"
backend_url: "https://yaml.example.com"
api_key: "yaml-key"
log_level: "trace"
channel_prefix: "chat:"
retry:
  max_attempts: 5
  base_delay_ms: 100
"#;
        fs::write(&config_file, yaml_content)?;

        let config = Config::load_config(Some(config_file), None)?;

        assert_eq!(config.backend_url, "https://yaml.example.com");
        assert_eq!(config.api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.agent_id, None);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.channel_prefix, "chat:");
        assert_eq!(config.retry.max_attempts, 5);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_load_config_from_json_file_without_retry() -> Result<(), Box<dyn std::error::Error>> {
        cleanup_env_vars();
        let temp_dir = TempDir::new()?;
        let config_file = temp_dir.path().join("roomline.json");
        fs::write(
            &config_file,
            r#"{"backend_url":"https://json.example.com","log_level":"warn","channel_prefix":"room:"}"#,
        )?;

        let config = Config::load_config(Some(config_file), None)?;

        assert_eq!(config.backend_url, "https://json.example.com");
        assert_eq!(config.retry, RetryConfig::default());
        Ok(())
    }

    #[test]
    fn test_load_config_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("roomline.toml");
        fs::write(&config_file, "backend_url = 'x'").unwrap();

        let result = Config::load_config(Some(config_file), None);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unsupported configuration format")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::with_defaults();
        config.backend_url = "not a url".to_string();
        config.retry.max_attempts = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Invalid backend URL"));
        assert!(errors[1].contains("max_attempts"));
    }
}
