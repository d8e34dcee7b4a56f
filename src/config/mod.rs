//! Configuration management.
//!
//! Values are resolved in order: built-in defaults, the TOML config file,
//! a `.env` file in the working directory, then `ENROLLA_*` environment
//! variables. API keys are held as [`SecretString`] and never printed.

use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ENROLLA_CONFIG_PATH";

/// Main configuration for enrolla.
#[derive(Debug, Clone, Default)]
pub struct EnrollaConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// `SQLite` database.
    pub database: DatabaseConfig,
    /// Generative backend.
    pub llm: LlmConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Prometheus exporter.
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database file.
    pub path: PathBuf,
    /// How long a statement waits on a locked database.
    pub timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            timeout_ms: 10_000,
        }
    }
}

/// Supported generative backends. Both speak the `OpenAI` chat-completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Groq-hosted models.
    #[default]
    Groq,
    /// `OpenAI`.
    OpenAi,
}

impl LlmBackend {
    /// Parses a provider name. Unknown names fall back to Groq.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Self::OpenAi,
            other => {
                if other != "groq" {
                    tracing::warn!(provider = other, "Unknown LLM provider, using groq");
                }
                Self::Groq
            },
        }
    }

    /// Environment variable holding this backend's API key.
    #[must_use]
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Generative backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Backend.
    pub provider: LlmBackend,
    /// Model override.
    pub model: Option<String>,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// API key. Without one the summary generator runs in fallback-only mode.
    pub api_key: Option<SecretString>,
    /// Request timeout.
    pub timeout_ms: u64,
    /// Connect timeout.
    pub connect_timeout_ms: u64,
    /// Consecutive failures before the circuit breaker opens.
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open.
    pub breaker_reset_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
            breaker_failure_threshold: 3,
            breaker_reset_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Also append logs to this file.
    pub file: Option<PathBuf>,
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Serve `/metrics`.
    pub enabled: bool,
    /// Exporter port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// `[server]` section.
    pub server: Option<ConfigFileServer>,
    /// `[database]` section.
    pub database: Option<ConfigFileDatabase>,
    /// `[llm]` section.
    pub llm: Option<ConfigFileLlm>,
    /// `[logging]` section.
    pub logging: Option<ConfigFileLogging>,
    /// `[metrics]` section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileServer {
    /// Bind address.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Database section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDatabase {
    /// Database file.
    pub path: Option<String>,
    /// Busy timeout.
    pub timeout_ms: Option<u64>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// API key. Prefer the provider's environment variable.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Breaker threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset.
    pub breaker_reset_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// "pretty" or "json".
    pub format: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enable the exporter.
    pub enabled: Option<bool>,
    /// Exporter port.
    pub port: Option<u16>,
}

impl EnrollaConfig {
    /// Loads configuration from every source.
    ///
    /// `explicit` (from `--config`) takes precedence over
    /// `ENROLLA_CONFIG_PATH`, which takes precedence over the platform
    /// default location. An explicitly named file must exist; the default
    /// file is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a named config file is missing or malformed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "Ignoring unreadable .env file");
        }

        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match named {
            Some(path) => Self::load_from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a file path, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `EnrollaConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }
        if let Some(database) = file.database {
            if let Some(path) = database.path {
                config.database.path = PathBuf::from(path);
            }
            if let Some(timeout_ms) = database.timeout_ms {
                config.database.timeout_ms = timeout_ms;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmBackend::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.base_url = llm.base_url;
            config.llm.api_key = llm.api_key.map(SecretString::from);
            if let Some(v) = llm.timeout_ms {
                config.llm.timeout_ms = v;
            }
            if let Some(v) = llm.connect_timeout_ms {
                config.llm.connect_timeout_ms = v;
            }
            if let Some(v) = llm.breaker_failure_threshold {
                config.llm.breaker_failure_threshold = v.max(1);
            }
            if let Some(v) = llm.breaker_reset_ms {
                config.llm.breaker_reset_ms = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format.as_deref().and_then(LogFormat::parse) {
                config.logging.format = format;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        config
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ENROLLA_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        override_parsed(&get, "ENROLLA_DATABASE_TIMEOUT_MS", &mut self.database.timeout_ms);
        if let Some(v) = get("ENROLLA_HOST") {
            self.server.host = v;
        }
        override_parsed(&get, "ENROLLA_PORT", &mut self.server.port);

        if let Some(v) = get("ENROLLA_LLM_PROVIDER") {
            self.llm.provider = LlmBackend::parse(&v);
        }
        if let Some(v) = get("ENROLLA_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("ENROLLA_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        override_parsed(&get, "ENROLLA_LLM_TIMEOUT_MS", &mut self.llm.timeout_ms);
        override_parsed(
            &get,
            "ENROLLA_LLM_CONNECT_TIMEOUT_MS",
            &mut self.llm.connect_timeout_ms,
        );
        if let Some(key) = get(self.llm.provider.api_key_env()) {
            self.llm.api_key = Some(SecretString::from(key));
        }

        if let Some(v) = get("ENROLLA_LOG_FORMAT") {
            match LogFormat::parse(&v) {
                Some(format) => self.logging.format = format,
                None => tracing::warn!(value = %v, "Ignoring invalid ENROLLA_LOG_FORMAT"),
            }
        }
        if let Some(v) = get("ENROLLA_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("ENROLLA_METRICS_ENABLED") {
            self.metrics.enabled = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        override_parsed(&get, "ENROLLA_METRICS_PORT", &mut self.metrics.port);
    }

    /// Renders the effective configuration as TOML with secrets redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let view = RedactedView {
            server: ServerView {
                host: &self.server.host,
                port: self.server.port,
            },
            database: DatabaseView {
                path: self.database.path.display().to_string(),
                timeout_ms: self.database.timeout_ms,
            },
            llm: LlmView {
                provider: self.llm.provider,
                model: self.llm.model.as_deref(),
                base_url: self.llm.base_url.as_deref(),
                api_key: if self.llm.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "(not set)"
                },
                timeout_ms: self.llm.timeout_ms,
                connect_timeout_ms: self.llm.connect_timeout_ms,
                breaker_failure_threshold: self.llm.breaker_failure_threshold,
                breaker_reset_ms: self.llm.breaker_reset_ms,
            },
            logging: LoggingView {
                format: self.logging.format,
                file: self.logging.file.as_ref().map(|p| p.display().to_string()),
            },
            metrics: MetricsView {
                enabled: self.metrics.enabled,
                port: self.metrics.port,
            },
        };
        toml::to_string_pretty(&view).map_err(|e| Error::OperationFailed {
            operation: "render_config".to_string(),
            cause: e.to_string(),
        })
    }
}

fn override_parsed<T, G>(get: &G, key: &str, target: &mut T)
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

/// Default config file location (`<config_dir>/enrolla/config.toml`).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("enrolla").join("config.toml"))
}

/// Default database location (`<data_dir>/enrolla/enrolla.db`, or
/// `./enrolla.db` when no home directory is known).
#[must_use]
pub fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("enrolla.db"),
        |dirs| dirs.data_dir().join("enrolla").join("enrolla.db"),
    )
}

#[derive(Serialize)]
struct RedactedView<'a> {
    server: ServerView<'a>,
    database: DatabaseView,
    llm: LlmView<'a>,
    logging: LoggingView,
    metrics: MetricsView,
}

#[derive(Serialize)]
struct ServerView<'a> {
    host: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct DatabaseView {
    path: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct LlmView<'a> {
    provider: LlmBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<&'a str>,
    api_key: &'static str,
    timeout_ms: u64,
    connect_timeout_ms: u64,
    breaker_failure_threshold: u32,
    breaker_reset_ms: u64,
}

#[derive(Serialize)]
struct LoggingView {
    format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[derive(Serialize)]
struct MetricsView {
    enabled: bool,
    port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EnrollaConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.timeout_ms, 10_000);
        assert_eq!(config.llm.timeout_ms, 30_000);
        assert_eq!(config.llm.provider, LlmBackend::Groq);
        assert!(config.llm.api_key.is_none());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9001

[database]
path = "/tmp/crm.db"
timeout_ms = 2500

[llm]
provider = "openai"
model = "gpt-4o-mini"
timeout_ms = 5000

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = EnrollaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path, PathBuf::from("/tmp/crm.db"));
        assert_eq!(config.database.timeout_ms, 2500);
        assert_eq!(config.llm.provider, LlmBackend::OpenAi);
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.llm.timeout_ms, 5000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sever]\nport = 1").unwrap();
        assert!(EnrollaConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EnrollaConfig::default();
        config.apply_env(env(&[
            ("ENROLLA_DATABASE_PATH", "/data/enrolla.db"),
            ("ENROLLA_PORT", "8080"),
            ("ENROLLA_LLM_TIMEOUT_MS", "not-a-number"),
            ("GROQ_API_KEY", "gsk_test"),
            ("OPENAI_API_KEY", "sk_unused"),
            ("ENROLLA_METRICS_ENABLED", "true"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/data/enrolla.db"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.timeout_ms, 30_000);
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret()),
            Some("gsk_test")
        );
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_api_key_follows_provider() {
        let mut config = EnrollaConfig::default();
        config.apply_env(env(&[
            ("ENROLLA_LLM_PROVIDER", "openai"),
            ("GROQ_API_KEY", "gsk_unused"),
            ("OPENAI_API_KEY", "sk_test"),
        ]));
        assert_eq!(config.llm.provider, LlmBackend::OpenAi);
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret()),
            Some("sk_test")
        );
    }

    #[test]
    fn test_redacted_toml_hides_key() {
        let mut config = EnrollaConfig::default();
        config.llm.api_key = Some(SecretString::from("gsk_very_secret".to_string()));
        let rendered = config.to_redacted_toml().unwrap();
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("gsk_very_secret"));
        assert!(rendered.contains("provider = \"groq\""));
    }
}
