//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "varco";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VALIDATION_REGEX: &str = "^[a-zA-Z0-9-_]+$";
const DEFAULT_PARAM_NAME: &str = "sp";
const DEFAULT_CACHE_SOCKET: &str = "/var/run/redis/redis-server.sock";
const DEFAULT_DATABASE_USERNAME: &str = "varcouser";
const DEFAULT_DATABASE_PASSWORD: &str = "varcopass";
const DEFAULT_DATABASE_NAME: &str = "varco";
const DEFAULT_DATABASE_SOCKET: &str = "/var/run/mysqld/mysqld.sock";

/// Command-line arguments for the varco binary.
#[derive(Debug, Parser)]
#[command(name = "varco", version, about = "varco stored-procedure cache gateway")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VARCO_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the varco HTTP gateway.
    Serve(Box<ServeArgs>),
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

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the action validation pattern.
    #[arg(long = "gateway-validation-regex", value_name = "REGEX")]
    pub gateway_validation_regex: Option<String>,

    /// Override the query parameter carrying the action name.
    #[arg(long = "gateway-param-name", value_name = "NAME")]
    pub gateway_param_name: Option<String>,

    /// Override the cache unix-socket path.
    #[arg(long = "cache-socket", value_name = "PATH")]
    pub cache_socket: Option<PathBuf>,

    /// Override the database username.
    #[arg(long = "database-username", value_name = "USER")]
    pub database_username: Option<String>,

    /// Override the database password.
    #[arg(long = "database-password", value_name = "PASSWORD")]
    pub database_password: Option<String>,

    /// Override the database schema name.
    #[arg(long = "database-name", value_name = "NAME")]
    pub database_name: Option<String>,

    /// Override the database unix-socket path.
    #[arg(long = "database-socket", value_name = "PATH")]
    pub database_socket: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
///
/// Built once at startup and shared read-only with every request handler.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub gateway: GatewaySettings,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Pattern an action must fully match before it is used downstream.
    /// Compiled per request; an invalid pattern fails the request, not startup.
    pub validation_regex: String,
    /// Query parameter carrying the action name.
    pub param_name: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub socket: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub name: String,
    pub socket: PathBuf,
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

    builder = builder.add_source(Environment::with_prefix("VARCO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    gateway: RawGatewaySettings,
    cache: RawCacheSettings,
    database: RawDatabaseSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(pattern) = overrides.gateway_validation_regex.as_ref() {
            self.gateway.validation_regex = Some(pattern.clone());
        }
        if let Some(name) = overrides.gateway_param_name.as_ref() {
            self.gateway.param_name = Some(name.clone());
        }
        if let Some(socket) = overrides.cache_socket.as_ref() {
            self.cache.socket = Some(socket.clone());
        }
        if let Some(username) = overrides.database_username.as_ref() {
            self.database.username = Some(username.clone());
        }
        if let Some(password) = overrides.database_password.as_ref() {
            self.database.password = Some(password.clone());
        }
        if let Some(name) = overrides.database_name.as_ref() {
            self.database.name = Some(name.clone());
        }
        if let Some(socket) = overrides.database_socket.as_ref() {
            self.database.socket = Some(socket.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            gateway,
            cache,
            database,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let gateway = build_gateway_settings(gateway)?;
        let cache = build_cache_settings(cache)?;
        let database = build_database_settings(database)?;

        Ok(Self {
            server,
            logging,
            gateway,
            cache,
            database,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_gateway_settings(gateway: RawGatewaySettings) -> Result<GatewaySettings, LoadError> {
    let validation_regex = gateway
        .validation_regex
        .unwrap_or_else(|| DEFAULT_VALIDATION_REGEX.to_string());
    if validation_regex.is_empty() {
        return Err(LoadError::invalid(
            "gateway.validation_regex",
            "pattern must not be empty",
        ));
    }

    let param_name = gateway
        .param_name
        .unwrap_or_else(|| DEFAULT_PARAM_NAME.to_string());
    if param_name.is_empty() {
        return Err(LoadError::invalid(
            "gateway.param_name",
            "parameter name must not be empty",
        ));
    }

    Ok(GatewaySettings {
        validation_regex,
        param_name,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let socket = cache
        .socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_SOCKET));
    if socket.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.socket",
            "socket path must not be empty",
        ));
    }

    Ok(CacheSettings { socket })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let username = database
        .username
        .unwrap_or_else(|| DEFAULT_DATABASE_USERNAME.to_string());
    if username.is_empty() {
        return Err(LoadError::invalid(
            "database.username",
            "username must not be empty",
        ));
    }

    let password = database
        .password
        .unwrap_or_else(|| DEFAULT_DATABASE_PASSWORD.to_string());

    let name = database
        .name
        .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
    if name.is_empty() {
        return Err(LoadError::invalid(
            "database.name",
            "schema name must not be empty",
        ));
    }

    let socket = database
        .socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_SOCKET));
    if socket.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "database.socket",
            "socket path must not be empty",
        ));
    }

    Ok(DatabaseSettings {
        username,
        password,
        name,
        socket,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGatewaySettings {
    validation_regex: Option<String>,
    param_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    username: Option<String>,
    password: Option<String>,
    name: Option<String>,
    socket: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
