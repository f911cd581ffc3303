//! Layered process configuration.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. `ddfeed.toml` in the working directory, if present
//! 2. the file named by `DDFEED_BACKEND_CONFIG_FILE`, if set
//! 3. environment variables prefixed `DDFEED_BACKEND_`
//!    (e.g. `DDFEED_BACKEND_DATA_SOURCE_NAME`, `DDFEED_BACKEND_PORT`)
//!
//! Every key is optional except `data_source_name`.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use ddfeed_api::ServerConfig;
use ddfeed_db::{PostgresConfig, ValkeyConfig};
use ddfeed_types::IdentityScheme;
use serde::Deserialize;

use crate::telemetry::LogFormat;

/// Environment variable prefix shared by every key.
const ENV_PREFIX: &str = "DDFEED_BACKEND";

/// Environment variable naming an extra configuration file.
const CONFIG_FILE_VAR: &str = "DDFEED_BACKEND_CONFIG_FILE";

/// Base name of the optional configuration file in the working directory.
const DEFAULT_CONFIG_BASENAME: &str = "ddfeed";

const DEFAULT_CACHE_URL: &str = "redis://valkey:6379";
const DEFAULT_DB_CONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DB_IDLE_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_CACHE_COMMAND_TIMEOUT_MS: u64 = 500;
const DEFAULT_CACHE_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Validated settings for one process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind address.
    pub server: ServerConfig,
    /// `PostgreSQL` pool settings.
    pub postgres: PostgresConfig,
    /// Startup connection attempts before giving up.
    pub db_connect_attempts: u32,
    /// Whether to apply embedded migrations at startup.
    pub run_migrations: bool,
    /// `Valkey` client settings.
    pub valkey: ValkeyConfig,
    /// How new external identifiers are assigned.
    pub identity_scheme: IdentityScheme,
    /// Log line format.
    pub log_format: LogFormat,
}

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source could not be read or a value had the wrong type.
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    /// A value was present but unusable, or a required key was missing.
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    data_source_name: Option<String>,
    cache_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    identity_scheme: Option<IdentityScheme>,
    db_max_connections: Option<u32>,
    db_connect_attempts: Option<u32>,
    db_acquire_timeout_ms: Option<u64>,
    db_idle_timeout_ms: Option<u64>,
    run_migrations: Option<bool>,
    cache_command_timeout_ms: Option<u64>,
    cache_connect_timeout_ms: Option<u64>,
    log_format: Option<LogFormat>,
}

/// Load settings from the file and environment layers.
///
/// # Errors
///
/// Returns [`SettingsError`] if a source is unreadable or a value is
/// missing or invalid.
pub fn load() -> Result<Settings, SettingsError> {
    let mut builder =
        Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Ok(path) = std::env::var(CONFIG_FILE_VAR) {
        builder = builder.add_source(File::with_name(&path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .try_parsing(true),
    );

    load_from(builder)
}

fn load_from(builder: ConfigBuilder<DefaultState>) -> Result<Settings, SettingsError> {
    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let url = raw
            .data_source_name
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                SettingsError::invalid("data_source_name", "a PostgreSQL URL is required")
            })?;

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: raw.host.unwrap_or(defaults.host),
            port: raw.port.unwrap_or(defaults.port),
        };

        let acquire_timeout = positive_millis(
            "db_acquire_timeout_ms",
            raw.db_acquire_timeout_ms
                .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_MS),
        )?;
        let idle_timeout = positive_millis(
            "db_idle_timeout_ms",
            raw.db_idle_timeout_ms.unwrap_or(DEFAULT_DB_IDLE_TIMEOUT_MS),
        )?;
        let mut postgres = PostgresConfig::new(&url)
            .with_acquire_timeout(acquire_timeout)
            .with_idle_timeout(idle_timeout);
        if let Some(max) = raw.db_max_connections {
            if max == 0 {
                return Err(SettingsError::invalid(
                    "db_max_connections",
                    "must be at least 1",
                ));
            }
            postgres = postgres.with_max_connections(max);
        }

        let db_connect_attempts = raw
            .db_connect_attempts
            .unwrap_or(DEFAULT_DB_CONNECT_ATTEMPTS);
        if db_connect_attempts == 0 {
            return Err(SettingsError::invalid(
                "db_connect_attempts",
                "must be at least 1",
            ));
        }

        let command_timeout = positive_millis(
            "cache_command_timeout_ms",
            raw.cache_command_timeout_ms
                .unwrap_or(DEFAULT_CACHE_COMMAND_TIMEOUT_MS),
        )?;
        let connect_timeout = positive_millis(
            "cache_connect_timeout_ms",
            raw.cache_connect_timeout_ms
                .unwrap_or(DEFAULT_CACHE_CONNECT_TIMEOUT_MS),
        )?;
        let valkey = ValkeyConfig::new(raw.cache_url.as_deref().unwrap_or(DEFAULT_CACHE_URL))
            .with_command_timeout(command_timeout)
            .with_connect_timeout(connect_timeout);

        Ok(Self {
            server,
            postgres,
            db_connect_attempts,
            run_migrations: raw.run_migrations.unwrap_or(true),
            valkey,
            identity_scheme: raw.identity_scheme.unwrap_or_default(),
            log_format: raw.log_format.unwrap_or_default(),
        })
    }
}

fn positive_millis(key: &'static str, millis: u64) -> Result<Duration, SettingsError> {
    if millis == 0 {
        return Err(SettingsError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, SettingsError> {
        load_from(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_fill_everything_but_the_database() {
        let settings =
            from_toml(r#"data_source_name = "postgresql://localhost/ddfeed""#).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.postgres.url, "postgresql://localhost/ddfeed");
        assert_eq!(settings.postgres.max_connections, 10);
        assert_eq!(settings.postgres.acquire_timeout, Duration::from_secs(5));
        assert_eq!(settings.postgres.idle_timeout, Duration::from_secs(300));
        assert_eq!(settings.db_connect_attempts, 10);
        assert!(settings.run_migrations);
        assert_eq!(settings.valkey.url, "redis://valkey:6379");
        assert_eq!(settings.valkey.command_timeout, Duration::from_millis(500));
        assert_eq!(settings.valkey.connect_timeout, Duration::from_millis(2000));
        assert_eq!(settings.identity_scheme, IdentityScheme::RandomUuid);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn every_key_can_be_overridden() {
        let settings = from_toml(
            r#"
            data_source_name = "postgresql://db/feed"
            cache_url = "redis://cache:6380"
            host = "127.0.0.1"
            port = 9090
            identity_scheme = "serial"
            db_max_connections = 4
            db_connect_attempts = 2
            db_acquire_timeout_ms = 750
            db_idle_timeout_ms = 60000
            run_migrations = false
            cache_command_timeout_ms = 50
            cache_connect_timeout_ms = 100
            log_format = "pretty"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.identity_scheme, IdentityScheme::Serial);
        assert_eq!(settings.postgres.max_connections, 4);
        assert_eq!(settings.db_connect_attempts, 2);
        assert_eq!(settings.postgres.acquire_timeout, Duration::from_millis(750));
        assert_eq!(settings.postgres.idle_timeout, Duration::from_secs(60));
        assert!(!settings.run_migrations);
        assert_eq!(settings.valkey.url, "redis://cache:6380");
        assert_eq!(settings.valkey.command_timeout, Duration::from_millis(50));
        assert_eq!(settings.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_database_url_is_rejected() {
        assert!(matches!(
            from_toml(""),
            Err(SettingsError::Invalid { key: "data_source_name", .. })
        ));
        assert!(matches!(
            from_toml(r#"data_source_name = "  ""#),
            Err(SettingsError::Invalid { key: "data_source_name", .. })
        ));
    }

    #[test]
    fn zero_values_are_rejected() {
        let result = from_toml(
            r#"
            data_source_name = "postgresql://db/feed"
            cache_command_timeout_ms = 0
            "#,
        );
        assert!(matches!(
            result,
            Err(SettingsError::Invalid { key: "cache_command_timeout_ms", .. })
        ));

        let result = from_toml(
            r#"
            data_source_name = "postgresql://db/feed"
            db_connect_attempts = 0
            "#,
        );
        assert!(matches!(
            result,
            Err(SettingsError::Invalid { key: "db_connect_attempts", .. })
        ));
    }

    #[test]
    fn unknown_scheme_fails_to_build() {
        let result = from_toml(
            r#"
            data_source_name = "postgresql://db/feed"
            identity_scheme = "ulid"
            "#,
        );
        assert!(matches!(result, Err(SettingsError::Build(_))));
    }
}
