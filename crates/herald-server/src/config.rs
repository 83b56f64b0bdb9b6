use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use herald_gateway::feed::DEFAULT_SNAPSHOT_CAP;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: Option<String>,
    /// `None` when `HERALD_STORE_TIMEOUT_MS=0`.
    pub store_timeout: Option<Duration>,
    pub feed_snapshot_cap: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_timeout_ms: u64 = parse_or(&lookup, "HERALD_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        let feed_snapshot_cap: u32 = parse_or(&lookup, "HERALD_FEED_SNAPSHOT_CAP", DEFAULT_SNAPSHOT_CAP)?;
        if feed_snapshot_cap == 0 {
            bail!("HERALD_FEED_SNAPSHOT_CAP must be at least 1");
        }

        Ok(Self {
            host: lookup("HERALD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "HERALD_PORT", 3000)?,
            db_path: PathBuf::from(lookup("HERALD_DB_PATH").unwrap_or_else(|| "herald.db".into())),
            jwt_secret: lookup("HERALD_JWT_SECRET").filter(|s| !s.is_empty()),
            store_timeout: (store_timeout_ms > 0).then(|| Duration::from_millis(store_timeout_ms)),
            feed_snapshot_cap,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
