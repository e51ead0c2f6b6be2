//! The command/reply seam between the facade and the store.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{Client, Cmd, IntoConnectionInfo, RedisResult, Value};
use tokio::sync::OnceCell;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Reconnect attempts (with exponential backoff) before a connect fails
const CONNECT_RETRIES: usize = 2;

/// Anything that can execute a store command and hand back the raw reply.
///
/// Implementations must be safe to share between tasks; the facade never
/// locks around a call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `cmd` on the shared connection.
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value>;

    /// Run a command that may block server-side (BLPOP). Must not hold up
    /// commands issued concurrently through `execute`.
    async fn execute_blocking(&self, cmd: &Cmd) -> RedisResult<Value>;
}

/// Transport backed by a real store over TCP.
///
/// The shared connection is established on first use and reconnects on
/// its own after a dropped connection.
pub struct RedisTransport {
    client: Client,
    addr: String,
    shared: OnceCell<ConnectionManager>,
}

impl RedisTransport {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut info = format!("redis://{}", config.addr)
            .into_connection_info()
            .map_err(|e| StoreError::Config(format!("bad store address '{}': {}", config.addr, e)))?;
        info.redis.db = config.db;
        info.redis.username = config.username.clone();
        info.redis.password = config.password.clone();

        let client = Client::open(info).map_err(|e| StoreError::Connection {
            addr: config.addr.clone(),
            source: e,
        })?;

        Ok(RedisTransport {
            client,
            addr: config.addr.clone(),
            shared: OnceCell::new(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn shared_connection(&self) -> RedisResult<ConnectionManager> {
        let manager = self
            .shared
            .get_or_try_init(|| async {
                tracing::debug!("Connecting to store at {}", self.addr);
                ConnectionManager::new_with_backoff(self.client.clone(), 2, 100, CONNECT_RETRIES).await
            })
            .await?;
        Ok(manager.clone())
    }

    async fn dedicated_connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_tokio_connection().await
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn execute(&self, cmd: &Cmd) -> RedisResult<Value> {
        let mut conn = self.shared_connection().await?;
        cmd.query_async(&mut conn).await
    }

    async fn execute_blocking(&self, cmd: &Cmd) -> RedisResult<Value> {
        let mut conn = self.dedicated_connection().await?;
        cmd.query_async(&mut conn).await
    }
}
