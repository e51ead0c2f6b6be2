//! Connection and scan configuration

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StoreError};

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Keys requested per `SCAN` round trip unless configured otherwise.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 10;

/// What prefix enumeration does with a key that disappeared between
/// `SCAN` discovering it and `GET` fetching its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// Fail the whole enumeration
    #[default]
    Abort,
    /// Leave the key out of the result
    Skip,
}

impl MissingKeyPolicy {
    /// Parse `abort` or `skip`, ignoring case
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Some(MissingKeyPolicy::Abort),
            "skip" => Some(MissingKeyPolicy::Skip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// COUNT hint sent with every SCAN call
    pub page_size: usize,
    pub on_missing: MissingKeyPolicy,
    /// Upper bound on a full prefix enumeration
    #[serde(with = "millis", rename = "deadline_ms")]
    pub deadline: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_SCAN_PAGE_SIZE,
            on_missing: MissingKeyPolicy::Abort,
            deadline: None,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn skip_missing(mut self) -> Self {
        self.on_missing = MissingKeyPolicy::Skip;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StoreError::Config("scan page size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Where the store lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` of the store
    pub addr: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    pub scan: ScanOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            username: None,
            password: None,
            db: 0,
            scan: ScanOptions::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    pub fn scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    /// Read `REDCACHE_ADDR`, `REDCACHE_USERNAME`, `REDCACHE_PASSWORD`,
    /// `REDCACHE_DB` and `REDCACHE_SCAN_ON_MISSING` (`abort` or `skip`),
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("REDCACHE_ADDR") {
            config.addr = addr;
        }
        config.username = lookup("REDCACHE_USERNAME").filter(|s| !s.is_empty());
        config.password = lookup("REDCACHE_PASSWORD").filter(|s| !s.is_empty());
        if let Some(db) = lookup("REDCACHE_DB") {
            config.db = db
                .parse()
                .map_err(|_| StoreError::Config(format!("REDCACHE_DB is not an integer: {}", db)))?;
        }
        if let Some(policy) = lookup("REDCACHE_SCAN_ON_MISSING") {
            config.scan.on_missing = MissingKeyPolicy::from_str(&policy).ok_or_else(|| {
                StoreError::Config(format!("REDCACHE_SCAN_ON_MISSING must be abort or skip: {}", policy))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.addr.is_empty() {
            return Err(StoreError::Config("store address is empty".to_string()));
        }
        if self.db < 0 {
            return Err(StoreError::Config(format!("negative database index {}", self.db)));
        }
        self.scan.validate()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}
