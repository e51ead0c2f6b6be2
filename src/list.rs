use std::time::Duration;

use redis::{FromRedisValue, ToRedisArgs};

use crate::error::{Result, StoreError};
use crate::handle::{log_failure, StoreHandle};

impl StoreHandle {
    /// RPUSH key value. Returns the new length of the list.
    pub async fn rpush<V: ToRedisArgs>(&self, key: &str, value: V) -> Result<u64> {
        log_failure(self.query(redis::cmd("RPUSH").arg(key).arg(value), "RPUSH", key).await)
    }

    /// BLPOP key [key ...] timeout
    ///
    /// Waits until one of `keys` has an element and pops it, returning
    /// `(key, element)`. Keys are tried in order. Running out of time is not
    /// an error: it yields `None`. A zero `timeout` waits indefinitely, so
    /// callers that need to give up should race this against their own
    /// timer or cancellation; dropping the future abandons the wait.
    pub async fn blpop(&self, timeout: Duration, keys: &[&str]) -> Result<Option<(String, String)>> {
        if keys.is_empty() {
            return Ok(None);
        }
        let label = keys.join(",");
        let mut cmd = redis::cmd("BLPOP");
        cmd.arg(keys).arg(timeout.as_secs_f64());

        let reply = log_failure(self.query_blocking(&cmd, "BLPOP", &label).await)?;
        let popped: Result<Option<(String, String)>> = FromRedisValue::from_redis_value(&reply)
            .map_err(|e| StoreError::command("BLPOP", label.as_str(), e));
        log_failure(popped)
    }

    /// LLEN key; a missing key has length 0.
    pub async fn llen(&self, key: &str) -> Result<u64> {
        log_failure(self.query(redis::cmd("LLEN").arg(key), "LLEN", key).await)
    }

    /// LRANGE key start stop, both ends inclusive; negative indices count
    /// from the tail.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        log_failure(
            self.query(redis::cmd("LRANGE").arg(key).arg(start).arg(stop), "LRANGE", key)
                .await,
        )
    }
}
