//! Client configuration.
//!
//! The input is a stock FastDFS `client.conf`: `key = value` lines, `#`
//! comments, optional `[section]` headers. Only the `DEFAULT` section (keys
//! before any header) is consulted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use fdfs_net::PoolConfig;
use fdfs_proto::DEFAULT_TRACKER_PORT;
use serde::{Deserialize, Serialize};

/// Idle bounds every tracker and storage pool is created with.
pub const POOL_MIN_IDLE: usize = 10;
pub const POOL_MAX_IDLE: usize = 150;

const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected `key = value`, got {text:?}")]
    Syntax { line: usize, text: String },

    #[error("no tracker servers configured (tracker_server)")]
    NoTrackers,

    #[error("invalid tracker port {0:?}")]
    InvalidPort(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the client configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Text(String),
}

impl ConfigSource {
    async fn load(&self) -> Result<ConfFile, ConfigError> {
        match self {
            ConfigSource::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Read {
                        path: path.clone(),
                        source,
                    })?;
                ConfFile::parse(&text)
            }
            ConfigSource::Text(text) => ConfFile::parse(text),
        }
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

/// Parsed `client.conf`, keyed by section then key.
#[derive(Debug, Default, Clone)]
pub struct ConfFile {
    sections: HashMap<String, HashMap<String, String>>,
}

impl ConfFile {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = DEFAULT_SECTION.to_owned();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_owned();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line: idx + 1,
                    text: raw.to_owned(),
                });
            };
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_owned(), value.trim().to_owned());
        }
        Ok(Self { sections })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    fn get_default(&self, key: &str) -> Option<&str> {
        self.get(DEFAULT_SECTION, key)
    }
}

/// Tracker hosts plus the one port used for all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub hosts: Vec<String>,
    pub port: u16,
}

impl TrackerConfig {
    /// Build from a `tracker_server` value.
    ///
    /// Entries are comma separated and may carry a `:port` suffix. Every
    /// suffix overwrites one shared port, so the last explicit port applies
    /// to the whole host list.
    pub fn from_server_list(list: &str) -> Result<Self, ConfigError> {
        let mut hosts = Vec::new();
        let mut port = None;
        for entry in list.split(',') {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            if parts.len() == 2 {
                port = Some(parts[1]);
            }
            if !parts[0].is_empty() {
                hosts.push(parts[0].to_owned());
            }
        }
        if hosts.is_empty() {
            return Err(ConfigError::NoTrackers);
        }
        let port = match port {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(p.to_owned()))?,
            None => DEFAULT_TRACKER_PORT,
        };
        Ok(Self { hosts, port })
    }
}

/// Everything the client needs from its configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub tracker: TrackerConfig,

    /// Dial timeout for tracker and storage connections.
    #[serde(with = "fdfs_net::duration_secs")]
    pub connect_timeout: Duration,

    /// Per read/write timeout on established connections.
    #[serde(with = "fdfs_net::duration_secs")]
    pub network_timeout: Duration,
}

impl ClientConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(60);

    pub async fn resolve(source: &ConfigSource) -> Result<Self, ConfigError> {
        let conf = source.load().await?;
        let tracker = tracker_from(&conf)?;
        let connect_timeout =
            seconds(&conf, "connect_timeout")?.unwrap_or(Self::DEFAULT_CONNECT_TIMEOUT);
        let network_timeout =
            seconds(&conf, "network_timeout")?.unwrap_or(Self::DEFAULT_NETWORK_TIMEOUT);
        Ok(Self {
            tracker,
            connect_timeout,
            network_timeout,
        })
    }

    /// Pool settings shared by the tracker pool and every storage pool.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_idle: POOL_MIN_IDLE,
            max_idle: POOL_MAX_IDLE,
            network_timeout: self.network_timeout,
            ..PoolConfig::default()
        }
    }
}

/// Resolve only the tracker endpoint set from `source`.
pub async fn resolve_tracker_config(source: &ConfigSource) -> Result<TrackerConfig, ConfigError> {
    tracker_from(&source.load().await?)
}

fn tracker_from(conf: &ConfFile) -> Result<TrackerConfig, ConfigError> {
    let list = conf
        .get_default("tracker_server")
        .ok_or(ConfigError::NoTrackers)?;
    TrackerConfig::from_server_list(list)
}

fn seconds(conf: &ConfFile, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = conf.get_default(key) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
        })
}
