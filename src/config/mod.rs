//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
pub mod contents;

use std::{
    collections::BTreeMap, fmt, net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, ProvidersArgs, RefreshArgs, ServeArgs, ServeOverrides, StorageOverrides,
};
pub use contents::{ContentSettings, SettingValue, SettingsError};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "dalec";
const ENV_PREFIX: &str = "DALEC";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_FRENCH_EDUC_ENDPOINT: &str =
    "https://data.education.gouv.fr/api/v2/catalog/datasets/fr-en-annuaire-education/records";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub contents: ContentSettings,
    pub providers: ProviderSettings,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Where each record kind lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!(
                "unknown storage backend `{other}` (expected `postgres` or `memory`)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub content_backend: StorageBackend,
    pub fetch_history_backend: StorageBackend,
}

impl StorageSettings {
    pub fn needs_database(&self) -> bool {
        self.content_backend == StorageBackend::Postgres
            || self.fetch_history_backend == StorageBackend::Postgres
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub request_timeout: Duration,
    pub french_educ_endpoint: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            french_educ_endpoint: DEFAULT_FRENCH_EDUC_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Refresh(args)) => raw.apply_storage_overrides(&args.storage),
        Some(Command::Providers(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
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
    database: RawDatabaseSettings,
    storage: RawStorageSettings,
    contents: RawContentSettings,
    providers: RawProviderSettings,
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
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(ttl) = overrides.contents_ttl_seconds {
            self.contents.ttl = Some(i64::try_from(ttl).unwrap_or(i64::MAX));
        }
        if let Some(count) = overrides.contents_nb_kept {
            self.contents.nb_contents_kept = Some(i64::try_from(count).unwrap_or(i64::MAX));
        }
        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(model) = overrides.content_model.as_ref() {
            self.storage.content_model = Some(model.clone());
        }
        if let Some(model) = overrides.fetch_history_model.as_ref() {
            self.storage.fetch_history_model = Some(model.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            storage,
            contents,
            providers,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            storage: build_storage_settings(storage)?,
            contents: build_content_settings(contents)?,
            providers: build_provider_settings(providers)?,
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let bundled = storage.bundled.unwrap_or(true);
    let content_backend =
        resolve_backend(storage.content_model, bundled, "storage.content_model")?;
    let fetch_history_backend = resolve_backend(
        storage.fetch_history_model,
        bundled,
        "storage.fetch_history_model",
    )?;

    Ok(StorageSettings {
        content_backend,
        fetch_history_backend,
    })
}

fn resolve_backend(
    value: Option<String>,
    bundled: bool,
    key: &'static str,
) -> Result<StorageBackend, LoadError> {
    match value.filter(|value| !value.trim().is_empty()) {
        Some(value) => StorageBackend::from_str(&value).map_err(|reason| LoadError::invalid(key, reason)),
        None if bundled => Ok(StorageBackend::Postgres),
        None => Err(LoadError::invalid(
            key,
            "must be set when storage.bundled is disabled",
        )),
    }
}

fn build_content_settings(contents: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let mut settings = ContentSettings::new();

    if let Some(count) = contents.nb_contents_kept {
        if count < 0 {
            return Err(LoadError::invalid(
                "contents.nb_contents_kept",
                "must not be negative",
            ));
        }
        settings.set_global(contents::NB_CONTENTS_KEPT, count);
    }
    if let Some(ttl) = contents.ttl {
        if ttl < 0 {
            return Err(LoadError::invalid("contents.ttl", "must not be negative"));
        }
        settings.set_global(contents::TTL, ttl);
    }
    if let Some(ajax_refresh) = contents.ajax_refresh {
        settings.set_global(contents::AJAX_REFRESH, ajax_refresh);
    }
    if let Some(framework) = contents.css_framework {
        let framework = framework.trim();
        if !framework.is_empty() {
            settings.set_global(contents::CSS_FRAMEWORK, framework);
        }
    }

    for (key, value) in contents.overrides {
        let key = contents::normalize_key(&key);
        validate_override(&key, &value)?;
        settings.set_override(&key, value);
    }

    Ok(settings)
}

fn validate_override(key: &str, value: &SettingValue) -> Result<(), LoadError> {
    let setting_key = format!("contents.overrides.{key}");
    let has_suffix = |setting: &str| key.ends_with(&format!("_{setting}"));

    if has_suffix(contents::NB_CONTENTS_KEPT) || has_suffix(contents::TTL) {
        if !value.as_int().is_some_and(|number| number >= 0) {
            return Err(LoadError::invalid(
                setting_key,
                "expected a non-negative integer",
            ));
        }
    } else if has_suffix(contents::AJAX_REFRESH) && value.as_bool().is_none() {
        return Err(LoadError::invalid(setting_key, "expected a boolean"));
    }
    Ok(())
}

fn build_provider_settings(
    providers: RawProviderSettings,
) -> Result<ProviderSettings, LoadError> {
    let timeout_secs = providers
        .request_timeout_seconds
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "providers.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let french_educ_endpoint = providers
        .french_educ_endpoint
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FRENCH_EDUC_ENDPOINT.to_string());
    url::Url::parse(&french_educ_endpoint).map_err(|err| {
        LoadError::invalid("providers.french_educ_endpoint", format!("invalid URL: {err}"))
    })?;

    Ok(ProviderSettings {
        request_timeout: Duration::from_secs(timeout_secs),
        french_educ_endpoint,
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
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    bundled: Option<bool>,
    content_model: Option<String>,
    fetch_history_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    nb_contents_kept: Option<i64>,
    ttl: Option<i64>,
    ajax_refresh: Option<bool>,
    css_framework: Option<String>,
    overrides: BTreeMap<String, SettingValue>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProviderSettings {
    request_timeout_seconds: Option<u64>,
    french_educ_endpoint: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
