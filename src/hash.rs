use redis::ToRedisArgs;

use crate::error::Result;
use crate::handle::{log_failure, StoreHandle};

impl StoreHandle {
    /// HGET key field. `None` when the key or the field is missing.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.query(redis::cmd("HGET").arg(key).arg(field), "HGET", key).await
    }

    /// HSET key field value. Returns true if the field is new.
    pub async fn hset<V: ToRedisArgs>(&self, key: &str, field: &str, value: V) -> Result<bool> {
        let added: i64 = log_failure(
            self.query(redis::cmd("HSET").arg(key).arg(field).arg(value), "HSET", key)
                .await,
        )?;
        Ok(added > 0)
    }

    /// HDEL key field. Returns true if the field existed.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let removed: i64 =
            log_failure(self.query(redis::cmd("HDEL").arg(key).arg(field), "HDEL", key).await)?;
        Ok(removed > 0)
    }
}
