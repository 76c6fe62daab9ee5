//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    #[serde(default)]
    pub tls_cert: String,
    #[serde(default)]
    pub tls_key: String,
    /// Optional directory with a front-end bundle, served under /static
    #[serde(default)]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file (created if missing)
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "gcp" (structured Cloud Logging output)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_cookie_name() -> String {
    "ticketdesk_session".to_string()
}

fn default_ttl_hours() -> i64 {
    24
}

/// One year
const MAX_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Deadline applied to every statistics query
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

fn default_query_timeout_ms() -> u64 {
    5000
}

/// Initial admin account, created at startup when no admin exists yet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
}

impl BootstrapConfig {
    pub fn is_configured(&self) -> bool {
        !self.admin_username.is_empty() && !self.admin_password.is_empty()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("TICKETDESK_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&config_path))
            .add_source(config::Environment::with_prefix("TICKETDESK").separator("__"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.http_port == 0 {
            anyhow::bail!("Invalid http_port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        // Both or neither
        let has_cert = !self.server.tls_cert.is_empty();
        let has_key = !self.server.tls_key.is_empty();
        if has_cert != has_key {
            anyhow::bail!("TLS configuration incomplete: both tls_cert and tls_key must be set, or neither");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.logging.level, valid_levels);
        }
        if self.logging.format != "text" && self.logging.format != "gcp" {
            anyhow::bail!("Invalid logging format '{}'. Must be 'text' or 'gcp'", self.logging.format);
        }

        if self.session.cookie_name.is_empty() {
            anyhow::bail!("session.cookie_name cannot be empty");
        }
        if self.session.ttl_hours <= 0 || self.session.ttl_hours > MAX_TTL_HOURS {
            anyhow::bail!(
                "session.ttl_hours must be between 1 and {}, got {}",
                MAX_TTL_HOURS,
                self.session.ttl_hours
            );
        }
        if self.stats.query_timeout_ms == 0 {
            anyhow::bail!("stats.query_timeout_ms must be positive");
        }

        let bootstrap = &self.bootstrap;
        if bootstrap.admin_username.is_empty() != bootstrap.admin_password.is_empty() {
            anyhow::bail!("Bootstrap admin incomplete: set both admin_username and admin_password, or neither");
        }

        Ok(())
    }

    pub fn tls_enabled(&self) -> bool {
        !self.server.tls_cert.is_empty() && !self.server.tls_key.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            tls_cert: String::new(),
            tls_key: String::new(),
            static_dir: String::new(),
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
            max_connections: 1,
            busy_timeout_ms: default_busy_timeout_ms(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: default_log_format(),
        },
        session: SessionConfig::default(),
        stats: StatsConfig::default(),
        bootstrap: BootstrapConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_half_configured_tls() {
        let mut config = test_config();
        config.server.tls_cert = "cert.pem".to_string();
        assert!(config.validate().is_err());
        config.server.tls_key = "key.pem".to_string();
        assert!(config.validate().is_ok());
        assert!(config.tls_enabled());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = test_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_stats_timeout() {
        let mut config = test_config();
        config.stats.query_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_ttl_bounds() {
        let mut config = test_config();
        config.session.ttl_hours = 0;
        assert!(config.validate().is_err());
        config.session.ttl_hours = i64::MAX;
        assert!(config.validate().is_err());
        config.session.ttl_hours = MAX_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_partial_bootstrap() {
        let mut config = test_config();
        config.bootstrap.admin_username = "root".to_string();
        assert!(config.validate().is_err());
        config.bootstrap.admin_password = "hunter22".to_string();
        assert!(config.validate().is_ok());
        assert!(config.bootstrap.is_configured());
    }
}
