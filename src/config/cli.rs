use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Dalec binary.
#[derive(Debug, Parser)]
#[command(name = "dalec", version, about = "Dalec content cache server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DALEC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Dalec HTTP service.
    Serve(Box<ServeArgs>),
    /// Refresh the cached contents of one scope (or one scope per channel object).
    Refresh(RefreshArgs),
    /// List the registered content providers.
    Providers(ProvidersArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the content storage backend (postgres|memory).
    #[arg(long = "storage-content-model", value_name = "BACKEND")]
    pub content_model: Option<String>,

    /// Override the fetch history storage backend (postgres|memory).
    #[arg(long = "storage-fetch-history-model", value_name = "BACKEND")]
    pub fetch_history_model: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

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

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the global time-to-live of cached contents.
    #[arg(long = "contents-ttl-seconds", value_name = "SECONDS")]
    pub contents_ttl_seconds: Option<u64>,

    /// Override the global number of contents kept per scope.
    #[arg(long = "contents-nb-kept", value_name = "COUNT")]
    pub contents_nb_kept: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Provider app name.
    #[arg(value_name = "APP")]
    pub app: String,

    /// Content type served by the provider.
    #[arg(value_name = "CONTENT_TYPE")]
    pub content_type: String,

    /// Optional channel narrowing the scope.
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Channel object; repeat to refresh several scopes at once.
    #[arg(long = "channel-object", value_name = "OBJECT")]
    pub channel_objects: Vec<String>,

    /// Ignore the time-to-live and always fetch.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,

    /// Keep refreshing the remaining channel objects when one fails.
    #[arg(long = "continue-on-error", action = clap::ArgAction::SetTrue)]
    pub continue_on_error: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProvidersArgs {
    /// Also instantiate providers that are only available through loaders.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub autoload: bool,
}
