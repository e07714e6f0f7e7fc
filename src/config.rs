use crate::assets::AssetPaths;
use crate::broadcaster::DEFAULT_CHANNEL_CAPACITY;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "tickr")]
#[command(about = "Todo lists over a REST API with live updates", long_about = None, version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "TICKR_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, env = "TICKR_PORT", default_value_t = 8000)]
    pub port: u16,

    /// SQLite database file, created with its parent directory if missing
    #[arg(long, env = "TICKR_DATABASE", default_value = "data/tickr.db")]
    pub database: PathBuf,

    #[arg(long, env = "TICKR_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, env = "TICKR_TEMPLATES_DIR", default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Write JSON logs to a daily rolling file in this directory instead of stderr
    #[arg(long, env = "TICKR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Pending events kept per live-update client before new ones are dropped
    #[arg(long, env = "TICKR_EVENT_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub event_capacity: usize,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn asset_paths(&self) -> AssetPaths {
        AssetPaths {
            static_dir: self.static_dir.clone(),
            templates_dir: self.templates_dir.clone(),
        }
    }
}
