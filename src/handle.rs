use std::sync::Arc;

use redis::{Cmd, FromRedisValue, Value};

use crate::config::{ScanOptions, StoreConfig};
use crate::error::{Result, StoreError};
use crate::memory::MemoryStore;
use crate::transport::{RedisTransport, Transport};

/// Shared handle to the store. Construct it once at startup and clone it
/// into whatever needs store access; clones share one transport.
#[derive(Clone)]
pub struct StoreHandle {
    transport: Arc<dyn Transport>,
    scan: ScanOptions,
}

impl StoreHandle {
    /// Connect to the store described by `config` and verify it answers
    /// `PING`. An unreachable store is an error.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let transport = RedisTransport::new(&config)?;
        let handle = Self::with_transport(transport, config.scan)?;
        if let Err(e) = handle.ping().await {
            return Err(match e {
                StoreError::Command { source, .. } => StoreError::Connection {
                    addr: config.addr,
                    source,
                },
                other => other,
            });
        }
        Ok(handle)
    }

    /// Like [`StoreHandle::open`], but an unreachable store is only logged.
    /// Operations fail individually until the store comes back.
    pub async fn open_lenient(config: StoreConfig) -> Result<Self> {
        let transport = RedisTransport::new(&config)?;
        let handle = Self::with_transport(transport, config.scan)?;
        if let Err(e) = handle.ping().await {
            tracing::warn!("Store at {} is not answering, continuing anyway: {}", config.addr, e);
        }
        Ok(handle)
    }

    /// Use any transport, e.g. a [`MemoryStore`] in tests.
    pub fn with_transport(transport: impl Transport + 'static, scan: ScanOptions) -> Result<Self> {
        scan.validate()?;
        Ok(Self {
            transport: Arc::new(transport),
            scan,
        })
    }

    /// Handle over a fresh in-process store with default scan options.
    pub fn memory() -> Self {
        Self {
            transport: Arc::new(MemoryStore::new()),
            scan: ScanOptions::default(),
        }
    }

    pub fn scan_options(&self) -> &ScanOptions {
        &self.scan
    }

    pub async fn ping(&self) -> Result<()> {
        self.query::<String>(&redis::cmd("PING"), "PING", "").await.map(|_| ())
    }

    /// Run `cmd` and decode the reply. `key` only labels errors.
    pub(crate) async fn query<T: FromRedisValue>(
        &self,
        cmd: &Cmd,
        command: &'static str,
        key: &str,
    ) -> Result<T> {
        let value = self
            .transport
            .execute(cmd)
            .await
            .map_err(|e| StoreError::command(command, key, e))?;
        T::from_redis_value(&value).map_err(|e| StoreError::command(command, key, e))
    }

    pub(crate) async fn query_blocking(&self, cmd: &Cmd, command: &'static str, key: &str) -> Result<Value> {
        self.transport
            .execute_blocking(cmd)
            .await
            .map_err(|e| StoreError::command(command, key, e))
    }
}

/// Log a failed write at the call site before handing it back.
pub(crate) fn log_failure<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::error!("{}", e);
    }
    result
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").field("scan", &self.scan).finish_non_exhaustive()
    }
}
