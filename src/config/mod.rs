//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "songstudio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Command-line arguments for the Song Studio binary.
#[derive(Debug, Parser)]
#[command(name = "songstudio", version, about = "Song Studio server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SONGSTUDIO_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Song Studio HTTP service.
    Serve(Box<ServeArgs>),
    /// Warm the cache against the configured database, then exit.
    #[command(name = "warmup")]
    Warmup(WarmupArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct WarmupArgs {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid configuration value for `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Directive {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE.into(),
            LogLevel::Debug => LevelFilter::DEBUG.into(),
            LogLevel::Info => LevelFilter::INFO.into(),
            LogLevel::Warn => LevelFilter::WARN.into(),
            LogLevel::Error => LevelFilter::ERROR.into(),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
                field: "server.host/server.port",
                message: err.to_string(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: NonZeroU32::new(DEFAULT_DB_MAX_CONNECTIONS)
                .expect("default pool size is non-zero"),
        }
    }
}

/// Cache tuning knobs; converted into [`crate::cache::CacheConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub warmup_on_start: bool,
    pub song_content_limit: usize,
    pub bundle_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub session_sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = crate::cache::CacheConfig::default();
        Self {
            warmup_on_start: defaults.warmup_on_start,
            song_content_limit: defaults.song_content_limit,
            bundle_ttl_secs: defaults.bundle_ttl_secs,
            session_ttl_secs: defaults.session_ttl_secs,
            session_sweep_interval_secs: defaults.session_sweep_interval_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

/// Parse the CLI, then load settings with file → env → CLI precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.clone()));
    }

    builder = builder.add_source(
        Environment::with_prefix("SONGSTUDIO")
            .separator("__")
            .try_parsing(true),
    );

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    apply_cli_overrides(&mut settings, cli)?;
    Ok(settings)
}

fn apply_cli_overrides(settings: &mut Settings, cli: &CliArgs) -> Result<(), ConfigError> {
    let overrides = match &cli.command {
        Some(Command::Serve(args)) => args.overrides.clone(),
        Some(Command::Warmup(args)) => ServeOverrides {
            database_url: args.database_url.clone(),
            ..Default::default()
        },
        None => ServeOverrides::default(),
    };

    if let Some(host) = overrides.server_host {
        settings.server.host = host;
    }
    if let Some(port) = overrides.server_port {
        settings.server.port = port;
    }
    if let Some(level) = overrides.log_level {
        settings.logging.level = level.parse().map_err(|message| ConfigError::Invalid {
            field: "logging.level",
            message,
        })?;
    }
    if let Some(url) = overrides.database_url {
        settings.database.url = Some(url);
    }
    if let Some(count) = overrides.database_max_connections {
        settings.database.max_connections =
            NonZeroU32::new(count).ok_or(ConfigError::Invalid {
                field: "database.max_connections",
                message: "pool size must be at least 1".to_string(),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(overrides: ServeOverrides) -> CliArgs {
        CliArgs {
            config_file: None,
            command: Some(Command::Serve(Box::new(ServeArgs { overrides }))),
        }
    }

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, DEFAULT_HOST);
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert!(settings.database.url.is_none());
        assert_eq!(settings.database.max_connections.get(), 8);
        assert!(settings.cache.warmup_on_start);
    }

    #[test]
    fn server_addr_parses() {
        let settings = Settings::default();
        let addr = settings.server.addr().expect("default addr");
        assert_eq!(addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn cli_overrides_apply() {
        let mut settings = Settings::default();
        let cli = cli(ServeOverrides {
            server_port: Some(8080),
            log_level: Some("debug".to_string()),
            database_url: Some("postgres://localhost/studio".to_string()),
            ..Default::default()
        });
        apply_cli_overrides(&mut settings, &cli).expect("overrides apply");

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://localhost/studio")
        );
    }

    #[test]
    fn zero_pool_size_rejected() {
        let mut settings = Settings::default();
        let cli = cli(ServeOverrides {
            database_max_connections: Some(0),
            ..Default::default()
        });
        let err = apply_cli_overrides(&mut settings, &cli).expect_err("zero pool size");
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut settings = Settings::default();
        let cli = cli(ServeOverrides {
            log_level: Some("loud".to_string()),
            ..Default::default()
        });
        assert!(apply_cli_overrides(&mut settings, &cli).is_err());
    }
}
