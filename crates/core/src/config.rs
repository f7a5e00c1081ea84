use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patterns::DEFAULT_PATTERNS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    /// Web API credential. An empty token is allowed; Slack rejects the calls.
    pub token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub patterns: Vec<String>,
    pub reaction: String,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_capacity: usize,
    pub ping_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub metrics_port: u16,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_token: Option<String>,
    pub api_base_url: Option<String>,
    pub patterns: Option<Vec<String>>,
    pub reaction: Option<String>,
    pub heartbeat_interval_secs: Option<u64>,
    pub server_enabled: Option<bool>,
    pub metrics_port: Option<u16>,
    pub log_level: Option<String>,
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
            slack: SlackConfig {
                token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            bot: BotConfig {
                patterns: DEFAULT_PATTERNS.iter().map(|word| word.to_string()).collect(),
                reaction: "doge".to_string(),
                heartbeat_interval_secs: 600,
                heartbeat_capacity: 10,
                ping_timeout_secs: 5,
            },
            server: ServerConfig {
                enabled: true,
                bind_address: "127.0.0.1".to_string(),
                metrics_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dogebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(token) = slack.token {
                self.slack.token = secret_value(token);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(patterns) = bot.patterns {
                self.bot.patterns = patterns;
            }
            if let Some(reaction) = bot.reaction {
                self.bot.reaction = reaction;
            }
            if let Some(heartbeat_interval_secs) = bot.heartbeat_interval_secs {
                self.bot.heartbeat_interval_secs = heartbeat_interval_secs;
            }
            if let Some(heartbeat_capacity) = bot.heartbeat_capacity {
                self.bot.heartbeat_capacity = heartbeat_capacity;
            }
            if let Some(ping_timeout_secs) = bot.ping_timeout_secs {
                self.bot.ping_timeout_secs = ping_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(enabled) = server.enabled {
                self.server.enabled = enabled;
            }
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(metrics_port) = server.metrics_port {
                self.server.metrics_port = metrics_port;
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
        // SLACK_TOKEN is the name deployments have always exported.
        let token = read_env("DOGEBOT_SLACK_TOKEN").or_else(|| read_env("SLACK_TOKEN"));
        if let Some(value) = token {
            self.slack.token = secret_value(value);
        }
        if let Some(value) = read_env("DOGEBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env("DOGEBOT_BOT_PATTERNS") {
            self.bot.patterns = parse_list(&value);
        }
        if let Some(value) = read_env("DOGEBOT_BOT_REACTION") {
            self.bot.reaction = value;
        }
        if let Some(value) = read_env("DOGEBOT_BOT_HEARTBEAT_INTERVAL_SECS") {
            self.bot.heartbeat_interval_secs =
                parse_u64("DOGEBOT_BOT_HEARTBEAT_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("DOGEBOT_BOT_PING_TIMEOUT_SECS") {
            self.bot.ping_timeout_secs = parse_u64("DOGEBOT_BOT_PING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DOGEBOT_SERVER_ENABLED") {
            self.server.enabled = parse_bool("DOGEBOT_SERVER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("DOGEBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DOGEBOT_SERVER_METRICS_PORT") {
            self.server.metrics_port = parse_u16("DOGEBOT_SERVER_METRICS_PORT", &value)?;
        }

        let log_level = read_env("DOGEBOT_LOGGING_LEVEL").or_else(|| read_env("DOGEBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DOGEBOT_LOGGING_FORMAT").or_else(|| read_env("DOGEBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(slack_token) = overrides.slack_token {
            self.slack.token = secret_value(slack_token);
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(patterns) = overrides.patterns {
            self.bot.patterns = patterns;
        }
        if let Some(reaction) = overrides.reaction {
            self.bot.reaction = reaction;
        }
        if let Some(heartbeat_interval_secs) = overrides.heartbeat_interval_secs {
            self.bot.heartbeat_interval_secs = heartbeat_interval_secs;
        }
        if let Some(enabled) = overrides.server_enabled {
            self.server.enabled = enabled;
        }
        if let Some(metrics_port) = overrides.metrics_port {
            self.server.metrics_port = metrics_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_bot(&self.bot)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dogebot.toml"), PathBuf::from("config/dogebot.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let base_url = slack.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.patterns.is_empty() {
        return Err(ConfigError::Validation(
            "bot.patterns must contain at least one word".to_string(),
        ));
    }
    if bot.patterns.iter().any(|pattern| pattern.trim().is_empty()) {
        return Err(ConfigError::Validation("bot.patterns must not contain blank entries".to_string()));
    }

    if bot.reaction.trim().is_empty() {
        return Err(ConfigError::Validation("bot.reaction must not be blank".to_string()));
    }

    if bot.heartbeat_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "bot.heartbeat_interval_secs must be greater than zero".to_string(),
        ));
    }
    if bot.heartbeat_capacity == 0 {
        return Err(ConfigError::Validation(
            "bot.heartbeat_capacity must be greater than zero".to_string(),
        ));
    }
    if bot.ping_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "bot.ping_timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.enabled && server.metrics_port == 0 {
        return Err(ConfigError::Validation(
            "server.metrics_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    bot: Option<BotPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    patterns: Option<Vec<String>>,
    reaction: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    heartbeat_capacity: Option<usize>,
    ping_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    enabled: Option<bool>,
    bind_address: Option<String>,
    metrics_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
