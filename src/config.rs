//! Start-up configuration.
//!
//! Values come from three layers, highest priority first: command line flags,
//! an optional YAML file named by `--config`, and built-in defaults. The
//! merged [`Config`] is immutable and shared read-only with every worker.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::confine::Confinement;

/// Standard Gopher port.
pub const DEFAULT_PORT: u16 = 70;

/// Served tree used when `-d` is absent or unusable.
pub const DEFAULT_ROOT: &str = "/var/gopher";

/// Command line flags.
#[derive(Debug, Parser)]
#[command(name = "gopherd", version, about = "Minimal Gopher responder")]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, allow_negative_numbers = true)]
    pub port: Option<i64>,

    /// Directory to serve and confine into
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How the served root is enforced
    #[arg(long, value_enum)]
    pub confinement: Option<Confinement>,

    /// Per-connection read/write deadline in seconds (0 disables)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Contents of the optional YAML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<i64>,
    pub root_dir: Option<PathBuf>,
    pub bind: Option<IpAddr>,
    pub confinement: Option<Confinement>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("malformed configuration file")
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file {}", path.display()))?;
        Self::from_yaml(&text)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub root_dir: PathBuf,
    pub bind: IpAddr,
    pub confinement: Confinement,
    /// Deadline applied to the request read and to the whole response write.
    pub io_timeout: Option<Duration>,
}

impl Config {
    /// Parses the process arguments and merges the configuration file, if any.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    /// Flags win over file values; invalid values fall back to the defaults
    /// with a warning rather than aborting.
    pub fn merge(cli: Cli, file: FileConfig) -> Self {
        let timeout_secs = cli.timeout_secs.or(file.timeout_secs).unwrap_or(0);

        Self {
            port: checked_port(cli.port.or(file.port)),
            root_dir: checked_root(cli.dir.or(file.root_dir)),
            bind: cli
                .bind
                .or(file.bind)
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            confinement: cli.confinement.or(file.confinement).unwrap_or_default(),
            io_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn checked_port(raw: Option<i64>) -> u16 {
    let Some(n) = raw else {
        return DEFAULT_PORT;
    };

    match u16::try_from(n) {
        Ok(port) if port > 0 => port,
        _ => {
            tracing::warn!("{} is not a valid port, using default of {}", n, DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}

fn checked_root(raw: Option<PathBuf>) -> PathBuf {
    match raw {
        Some(dir) if dir.is_dir() => dir,
        Some(dir) => {
            tracing::warn!(
                "{} does not seem to be a directory, using default of {}",
                dir.display(),
                DEFAULT_ROOT
            );
            PathBuf::from(DEFAULT_ROOT)
        }
        None => PathBuf::from(DEFAULT_ROOT),
    }
}
