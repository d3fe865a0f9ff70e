use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub delivery: DeliveryConfig,
    pub slack: SlackConfig,
    pub logging: LoggingConfig,
}

/// Delivery behavior for the dispatcher and bulk orchestrator.
///
/// Constructed once at load time and injected; nothing below the config
/// loader reads ambient process state, which is what keeps the safety gate
/// testable and immune to accidental bypass from caller-facing inputs.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// When true, every outbound notification goes to `test_recipient`.
    pub test_mode: bool,
    pub test_recipient: Option<String>,
    /// Canonical fulfillment branch for completely unknown locations.
    pub default_branch: String,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub bulk_concurrency: usize,
    pub bulk_budget_secs: u64,
    pub call_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub test_mode: Option<bool>,
    pub test_recipient: Option<String>,
    pub default_branch: Option<String>,
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryConfig {
                test_mode: true,
                test_recipient: None,
                default_branch: "Quezon City".to_string(),
                retry_attempts: 3,
                retry_backoff_ms: 500,
                bulk_concurrency: 2,
                bulk_budget_secs: 120,
                call_timeout_secs: 10,
            },
            slack: SlackConfig { bot_token: String::new().into() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    delivery: Option<DeliveryPatch>,
    slack: Option<SlackPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryPatch {
    test_mode: Option<bool>,
    test_recipient: Option<String>,
    default_branch: Option<String>,
    retry_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    bulk_concurrency: Option<usize>,
    bulk_budget_secs: Option<u64>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("routey.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(delivery) = patch.delivery {
            if let Some(test_mode) = delivery.test_mode {
                self.delivery.test_mode = test_mode;
            }
            if let Some(test_recipient) = delivery.test_recipient {
                self.delivery.test_recipient = Some(test_recipient);
            }
            if let Some(default_branch) = delivery.default_branch {
                self.delivery.default_branch = default_branch;
            }
            if let Some(retry_attempts) = delivery.retry_attempts {
                self.delivery.retry_attempts = retry_attempts;
            }
            if let Some(retry_backoff_ms) = delivery.retry_backoff_ms {
                self.delivery.retry_backoff_ms = retry_backoff_ms;
            }
            if let Some(bulk_concurrency) = delivery.bulk_concurrency {
                self.delivery.bulk_concurrency = bulk_concurrency;
            }
            if let Some(bulk_budget_secs) = delivery.bulk_budget_secs {
                self.delivery.bulk_budget_secs = bulk_budget_secs;
            }
            if let Some(call_timeout_secs) = delivery.call_timeout_secs {
                self.delivery.call_timeout_secs = call_timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = bot_token_value.into();
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
        if let Some(value) = read_env("ROUTEY_DELIVERY_TEST_MODE") {
            self.delivery.test_mode = parse_bool("ROUTEY_DELIVERY_TEST_MODE", &value)?;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_TEST_RECIPIENT") {
            self.delivery.test_recipient = Some(value);
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_DEFAULT_BRANCH") {
            self.delivery.default_branch = value;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_RETRY_ATTEMPTS") {
            self.delivery.retry_attempts = parse_u32("ROUTEY_DELIVERY_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_RETRY_BACKOFF_MS") {
            self.delivery.retry_backoff_ms = parse_u64("ROUTEY_DELIVERY_RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_BULK_CONCURRENCY") {
            self.delivery.bulk_concurrency =
                parse_u32("ROUTEY_DELIVERY_BULK_CONCURRENCY", &value)? as usize;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_BULK_BUDGET_SECS") {
            self.delivery.bulk_budget_secs = parse_u64("ROUTEY_DELIVERY_BULK_BUDGET_SECS", &value)?;
        }
        if let Some(value) = read_env("ROUTEY_DELIVERY_CALL_TIMEOUT_SECS") {
            self.delivery.call_timeout_secs =
                parse_u64("ROUTEY_DELIVERY_CALL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROUTEY_SLACK_BOT_TOKEN") {
            self.slack.bot_token = value.into();
        }

        let log_level = read_env("ROUTEY_LOGGING_LEVEL").or_else(|| read_env("ROUTEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROUTEY_LOGGING_FORMAT").or_else(|| read_env("ROUTEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(test_mode) = overrides.test_mode {
            self.delivery.test_mode = test_mode;
        }
        if let Some(test_recipient) = overrides.test_recipient {
            self.delivery.test_recipient = Some(test_recipient);
        }
        if let Some(default_branch) = overrides.default_branch {
            self.delivery.default_branch = default_branch;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = bot_token.into();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let delivery = &self.delivery;
        if delivery.test_mode
            && delivery.test_recipient.as_deref().map_or(true, |value| value.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "delivery.test_mode requires delivery.test_recipient".to_string(),
            ));
        }
        if delivery.default_branch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "delivery.default_branch must not be empty".to_string(),
            ));
        }
        if delivery.retry_attempts == 0 {
            return Err(ConfigError::Validation(
                "delivery.retry_attempts must be at least 1".to_string(),
            ));
        }
        if delivery.bulk_concurrency == 0 {
            return Err(ConfigError::Validation(
                "delivery.bulk_concurrency must be at least 1".to_string(),
            ));
        }
        if delivery.bulk_budget_secs == 0 {
            return Err(ConfigError::Validation(
                "delivery.bulk_budget_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("routey.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::config::{AppConfig, ConfigOverrides, LoadOptions};

    fn base_overrides() -> ConfigOverrides {
        ConfigOverrides {
            test_recipient: Some("hr.sandbox@example.ph".to_owned()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_are_test_mode_with_conservative_delivery_budgets() {
        let config = AppConfig::load(LoadOptions {
            overrides: base_overrides(),
            ..LoadOptions::default()
        })
        .expect("defaults load");

        assert!(config.delivery.test_mode);
        assert_eq!(config.delivery.retry_attempts, 3);
        assert_eq!(config.delivery.bulk_concurrency, 2);
        assert_eq!(config.delivery.default_branch, "Quezon City");
    }

    #[test]
    fn test_mode_without_test_recipient_is_rejected() {
        let error = AppConfig::load(LoadOptions::default())
            .expect_err("test mode with no recipient must fail validation");
        assert!(error.to_string().contains("test_recipient"));
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        writeln!(
            file,
            "[delivery]\ntest_mode = false\nretry_attempts = 5\nbulk_concurrency = 4\n\n[logging]\nlevel = \"debug\""
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("patched config loads");

        assert!(!config.delivery.test_mode);
        assert_eq!(config.delivery.retry_attempts, 5);
        assert_eq!(config.delivery.bulk_concurrency, 4);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: base_overrides(),
        })
        .expect_err("required file missing");
        assert!(error.to_string().contains("does-not-exist.toml"));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                test_mode: Some(false),
                default_branch: Some("Cebu".to_owned()),
                log_level: Some("trace".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("overrides load");

        assert!(!config.delivery.test_mode);
        assert_eq!(config.delivery.default_branch, "Cebu");
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn zero_retry_attempts_fail_validation() {
        let mut config = AppConfig::default();
        config.delivery.test_mode = false;
        config.delivery.retry_attempts = 0;
        assert!(config.validate().is_err());
    }
}
