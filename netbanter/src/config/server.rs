use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Args;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::magic::RelativePathBuf,
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::error::Error;

use super::TracingGuard;

pub const DEFAULT_SERVER_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);

#[derive(Deserialize, Serialize, Debug)]
pub struct ServerConfig {
    pub(crate) bind: SocketAddr,
    pub(crate) outbound_queue_capacity: usize,
    pub(crate) max_frame_size: usize,
    #[serde(with = "humantime_serde")]
    pub(crate) shutdown_timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) log_path: Option<RelativePathBuf>,
    pub(crate) file_log: bool,
}

#[derive(Args, Debug, Serialize, Default)]
#[command(rename_all = "kebab-case")]
pub struct ServerConfigCli {
    /// The address to bind to, default to `0.0.0.0:3000`
    #[arg(short, long)]
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub bind: Option<String>,
    /// The path of the config file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<String>,
    /// The number of events queued for a peer before it is disconnected, default to 64
    #[arg(long)]
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub outbound_queue_capacity: Option<usize>,
    /// The largest accepted inbound message in bytes, default to 64 KiB
    #[arg(long)]
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub max_frame_size: Option<usize>,
    /// How long to wait for sessions to close on shutdown, default to 5s
    #[arg(long)]
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub shutdown_timeout: Option<String>,
    /// The log file path. If not specified, then the default rolling log file path would be used.
    /// If specified, then the log file would be exactly at the path specified.
    #[arg(long)]
    #[serde(skip_serializing_if = "::std::option::Option::is_none")]
    pub log_path: Option<String>,
    /// Enable logging to file
    #[arg(long)]
    #[serde(skip_serializing_if = "::std::ops::Not::not")]
    pub file_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_SERVER_ADDR,
            outbound_queue_capacity: 64,
            max_frame_size: 64 * 1024,
            shutdown_timeout: Duration::from_secs(5),
            log_path: None,
            file_log: false,
        }
    }
}

impl ServerConfig {
    pub fn new(cli: &ServerConfigCli) -> crate::error::Result<Self> {
        // `PORT` only moves the default bind, every other layer still wins
        let mut defaults = Self::default();
        let port: PortOverride = Figment::from(Env::raw().only(&["port"])).extract()?;
        if let Some(port) = port.port {
            defaults.bind.set_port(port);
        }
        let config: Self = Figment::new()
            .merge(Serialized::from(defaults, "server"))
            .merge(Toml::file(cli.config.as_deref().unwrap_or("config.toml")).nested())
            .merge(Env::prefixed("BANTER_").profile("server"))
            .merge(Serialized::from(cli, "server"))
            .select("server")
            .extract()?;
        if config.outbound_queue_capacity == 0 {
            return Err(Error::ConfigError(figment::Error::from(
                "outbound_queue_capacity must be at least 1",
            )));
        }
        Ok(config)
    }

    fn file_appender(&self) -> crate::error::Result<RollingFileAppender> {
        self.log_path
            .as_ref()
            .and_then(|p| {
                let path = p.relative();
                let dir = path.parent();
                let file_name = path.file_name();
                match (dir, file_name) {
                    (Some(dir), Some(file_name)) => {
                        Some(tracing_appender::rolling::never(dir, file_name))
                    }
                    _ => None,
                }
            })
            .or_else(|| {
                dirs::cache_dir()
                    .map(|mut p| {
                        p.push("banter");
                        p.push("server");
                        p
                    })
                    .map(|dir| tracing_appender::rolling::daily(dir, format!("{}.log", self.bind)))
            })
            .ok_or(Error::ConfigError(figment::Error::from(
                "log path not valid and cache directory not found",
            )))
    }

    pub fn setup_tracing_subscriber(&self) -> crate::error::Result<TracingGuard> {
        let (file_layer, file_guard) = if self.file_log {
            let (non_blocking, guard) = tracing_appender::non_blocking(self.file_appender()?);
            let env_filter = tracing_subscriber::EnvFilter::try_from_env("BANTER_FILE_LOG_FILTER")
                .unwrap_or_else(|_| "netbanter=info".into());
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_filter(env_filter);
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        if let Err(e) = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "netbanter=info,tower_http=info".into()),
                ),
            )
            .with(file_layer)
            .try_init()
        {
            eprintln!("tracing subscriber already installed: {}", e);
        }
        Ok(TracingGuard { file_guard })
    }
}

#[derive(Deserialize, Debug)]
struct PortOverride {
    port: Option<u16>,
}
