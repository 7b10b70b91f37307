use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub showplan: ShowPlanConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Plan engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShowPlanConfig {
    /// Largest accepted plan payload; accepts 67108864, "64MB", "512KB"
    #[serde(deserialize_with = "deserialize_size_bytes")]
    pub max_payload_bytes: usize,
    /// Report failing statements instead of failing the whole batch
    pub isolate_statement_failures: bool,
    pub default_locale: String,
}

impl Config {
    /// Load configuration with environment variable override support
    ///
    /// Loading order:
    /// 1. `explicit` path if given, else the first of conf/config.toml, config.toml
    /// 2. Override with environment variables (prefixed with APP_)
    /// 3. Validate the final configuration
    pub fn load(explicit: Option<&str>) -> Result<Self, anyhow::Error> {
        let mut config = match explicit {
            Some(path) => Self::from_toml(path)?,
            None => match Self::find_config_file() {
                Some(path) => Self::from_toml(&path)?,
                None => {
                    tracing::warn!("Configuration file not found, using defaults");
                    Config::default()
                },
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST: Server host (default: 0.0.0.0)
    /// - APP_SERVER_PORT: Server port (default: 8080)
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,sqltools_service=debug")
    /// - APP_SHOWPLAN_MAX_PAYLOAD: Plan size limit (accepts "64MB", "512KB", bytes)
    /// - APP_SHOWPLAN_ISOLATE_FAILURES: Isolate per-statement failures (true/false)
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(size) = std::env::var("APP_SHOWPLAN_MAX_PAYLOAD") {
            match parse_size_to_bytes(&size) {
                Ok(val) => {
                    self.showplan.max_payload_bytes = val;
                    tracing::info!(
                        "Override showplan.max_payload_bytes from env: {}",
                        self.showplan.max_payload_bytes
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_SHOWPLAN_MAX_PAYLOAD '{}': {} (keep {})",
                    size,
                    e,
                    self.showplan.max_payload_bytes
                ),
            }
        }

        if let Ok(isolate) = std::env::var("APP_SHOWPLAN_ISOLATE_FAILURES")
            && let Ok(val) = isolate.parse()
        {
            self.showplan.isolate_statement_failures = val;
            tracing::info!(
                "Override showplan.isolate_statement_failures from env: {}",
                self.showplan.isolate_statement_failures
            );
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.showplan.max_payload_bytes == 0 {
            anyhow::bail!("showplan.max_payload_bytes must be > 0");
        }

        if !crate::utils::i18n::SUPPORTED_LOCALES.contains(&self.showplan.default_locale.as_str()) {
            anyhow::bail!(
                "showplan.default_locale '{}' is not one of {:?}",
                self.showplan.default_locale,
                crate::utils::i18n::SUPPORTED_LOCALES
            );
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml"];

        possible_paths
            .iter()
            .find(|path| Path::new(path).exists())
            .map(|path| path.to_string())
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn from_toml_str(content: &str) -> Result<Self, anyhow::Error> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,sqltools_service=debug".to_string(),
            file: Some("logs/sqltools-service.log".to_string()),
        }
    }
}

impl Default for ShowPlanConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024 * 1024,
            isolate_statement_failures: true,
            default_locale: crate::utils::i18n::DEFAULT_LOCALE.to_string(),
        }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_size_to_bytes(input: &str) -> Result<usize, String> {
    // Plain numbers are bytes
    if let Ok(val) = input.trim().parse::<usize>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: usize = num_str.parse().map_err(|_| "invalid number".to_string())?;
    let multiplier: usize = match unit.trim() {
        "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        other => return Err(format!("unsupported unit: {}", other)),
    };
    n.checked_mul(multiplier).ok_or_else(|| "size overflows".to_string())
}

fn deserialize_size_bytes<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = usize;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of bytes or a string like '64MB', '512KB'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            usize::try_from(v).map_err(E::custom)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            usize::try_from(v).map_err(|_| E::custom("negative not allowed"))
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_size_to_bytes(v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}
