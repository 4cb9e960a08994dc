//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "staffetta";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 30;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    pub base_url: Url,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("STAFFETTA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parse the CLI and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.origin_base_url.as_ref() {
            self.origin.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.origin_timeout_seconds {
            self.origin.request_timeout_seconds = Some(seconds);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let host = raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = raw.server.port.unwrap_or(DEFAULT_PORT);
        let listen_addr = SocketAddr::from_str(&format!("{host}:{port}"))
            .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;

        let graceful_shutdown = Duration::from_secs(
            raw.server
                .graceful_shutdown_seconds
                .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        );

        let level = match raw.logging.level {
            Some(value) => LevelFilter::from_str(&value)
                .map_err(|_| LoadError::invalid("logging.level", format!("unrecognized level `{value}`")))?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let base_url = match raw.origin.base_url {
            Some(value) => Url::parse(&value)
                .map_err(|err| LoadError::invalid("origin.base_url", err.to_string()))?,
            None => {
                return Err(LoadError::invalid(
                    "origin.base_url",
                    "must be set to the upstream server this gateway shields",
                ));
            }
        };
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(LoadError::invalid(
                "origin.base_url",
                format!("unsupported scheme `{}`", base_url.scheme()),
            ));
        }

        let request_timeout = Duration::from_secs(
            raw.origin
                .request_timeout_seconds
                .unwrap_or(DEFAULT_ORIGIN_TIMEOUT_SECS),
        );

        Ok(Self {
            server: ServerSettings {
                listen_addr,
                graceful_shutdown,
            },
            logging: LoggingSettings { level, format },
            origin: OriginSettings {
                base_url,
                request_timeout,
            },
        })
    }
}
