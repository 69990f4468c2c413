// Runtime configuration read from the environment.
//
// Variables
// - EVENT_STREAMS_DB_PATH: redb file path.
// - EVENT_STREAMS_CACHE_BYTES: redb cache size in bytes.
// - EVENT_STREAMS_NOTIFY_CAPACITY: announcements a slow session may fall behind before it skips.
// - EVENT_STREAMS_SESSIONS: sessions started by the binary.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};

use crate::shared::infrastructure::durable_store::redb_store::RedbStoreConfig;

pub const DB_PATH: &str = "EVENT_STREAMS_DB_PATH";
pub const CACHE_BYTES: &str = "EVENT_STREAMS_CACHE_BYTES";
pub const NOTIFY_CAPACITY: &str = "EVENT_STREAMS_NOTIFY_CAPACITY";
pub const SESSIONS: &str = "EVENT_STREAMS_SESSIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub cache_bytes: usize,
    pub notify_capacity: usize,
    pub sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        let store = RedbStoreConfig::default();
        Self {
            db_path: store.db_path,
            cache_bytes: store.cache_size,
            notify_capacity: 1024,
            sessions: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            db_path: lookup(DB_PATH).map(PathBuf::from).unwrap_or(defaults.db_path),
            cache_bytes: parse_or(&lookup, CACHE_BYTES, defaults.cache_bytes)?,
            notify_capacity: parse_or(&lookup, NOTIFY_CAPACITY, defaults.notify_capacity)?,
            sessions: parse_or(&lookup, SESSIONS, defaults.sessions)?,
        };
        if config.notify_capacity == 0 {
            bail!("{NOTIFY_CAPACITY} must be greater than zero");
        }
        if config.sessions == 0 {
            bail!("{SESSIONS} must be greater than zero");
        }
        Ok(config)
    }

    pub fn store(&self) -> RedbStoreConfig {
        RedbStoreConfig {
            db_path: self.db_path.clone(),
            cache_size: self.cache_bytes,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        None => Ok(default),
    }
}
