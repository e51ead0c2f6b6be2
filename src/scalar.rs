//! Single-key string values: GET/SET/EXISTS/EXPIRE/TTL/DEL/MSET

use std::time::Duration;

use redis::{FromRedisValue, ToRedisArgs};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::handle::{log_failure, StoreHandle};

impl StoreHandle {
    /// SET key value [PX ms]
    ///
    /// The expiry is applied atomically with the write. `None` or a
    /// sub-millisecond duration writes without expiry. An expiry too long
    /// to express in milliseconds is rejected without writing.
    pub async fn set<V: ToRedisArgs>(&self, key: &str, value: V, expiry: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(expiry) = expiry {
            let ms = i64::try_from(expiry.as_millis()).map_err(|_| {
                StoreError::Config(format!("expiry {:?} for '{}' is out of range", expiry, key))
            });
            let ms = log_failure(ms)?;
            if ms > 0 {
                cmd.arg("PX").arg(ms);
            }
        }
        log_failure(self.query::<()>(&cmd, "SET", key).await)
    }

    /// EXISTS key
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let count: i64 = self.query(redis::cmd("EXISTS").arg(key), "EXISTS", key).await?;
        Ok(count > 0)
    }

    /// GET key, decoded as UTF-8. `None` when the key does not exist.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key), "GET", key).await
    }

    /// GET key without decoding
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.query(redis::cmd("GET").arg(key), "GET", key).await
    }

    pub async fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_number(key).await
    }

    pub async fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_number(key).await
    }

    pub async fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_number(key).await
    }

    pub async fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_number(key).await
    }

    /// A missing key reads as zero; a value that does not parse is an error.
    async fn get_number<T: FromRedisValue + Default>(&self, key: &str) -> Result<T> {
        let value: Option<T> = self.query(redis::cmd("GET").arg(key), "GET", key).await?;
        Ok(value.unwrap_or_default())
    }

    /// EXPIRE key seconds. Returns false if the key does not exist.
    pub async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        log_failure(self.query(redis::cmd("EXPIRE").arg(key).arg(seconds), "EXPIRE", key).await)
    }

    /// Remaining time to live in milliseconds, as reported by the store
    /// (-2 for a missing key, -1 for a key without expiry).
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        self.query(redis::cmd("PTTL").arg(key), "PTTL", key).await
    }

    /// Remaining time to live in seconds; same sentinels as [`pttl`](Self::pttl).
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.query(redis::cmd("TTL").arg(key), "TTL", key).await
    }

    /// Serialize `value` as JSON and SET it.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, expiry: Option<Duration>) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.set(key, data, expiry).await
    }

    /// The stored JSON document as bytes, without parsing it.
    pub async fn get_json_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_raw(key).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// DEL key. Deleting a missing key is not an error; returns the number
    /// of keys removed.
    pub async fn del(&self, key: &str) -> Result<u64> {
        log_failure(self.query(redis::cmd("DEL").arg(key), "DEL", key).await)
    }

    /// DEL key [key ...]
    pub async fn batch_del(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let label = keys.join(",");
        log_failure(self.query(redis::cmd("DEL").arg(keys), "DEL", &label).await)
    }

    /// MSET key value [key value ...]; all pairs are written or none.
    pub async fn mset<V: ToRedisArgs>(&self, pairs: &[(&str, V)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (key, value) in pairs {
            cmd.arg(*key).arg(value);
        }
        let label = pairs.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(",");
        log_failure(self.query::<()>(&cmd, "MSET", &label).await)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use crate::config::ScanOptions;
    use crate::memory::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_set_get_string() {
        let db = StoreHandle::memory();
        db.set("greeting", "hello", None).await.unwrap();
        assert_eq!(db.get_string("greeting").await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = StoreHandle::memory();
        assert_eq!(db.get_string("missing").await.unwrap(), None);
        assert_eq!(db.get_raw("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_missing() {
        let db = StoreHandle::memory();
        db.set("empty", "", None).await.unwrap();
        assert_eq!(db.get_string("empty").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_get_string_surfaces_transport_errors() {
        let store = MemoryStore::new();
        let db = StoreHandle::with_transport(store.clone(), ScanOptions::default()).unwrap();
        store.fail_command("GET", 1);
        let err = db.get_string("k").await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_numeric_getters() {
        let db = StoreHandle::memory();
        db.set("i", 42, None).await.unwrap();
        db.set("neg", -7i64, None).await.unwrap();
        db.set("big", u64::MAX, None).await.unwrap();
        db.set("f", 2.5f64, None).await.unwrap();

        assert_eq!(db.get_i32("i").await.unwrap(), 42);
        assert_eq!(db.get_i64("neg").await.unwrap(), -7);
        assert_eq!(db.get_u64("big").await.unwrap(), u64::MAX);
        assert_eq!(db.get_f64("f").await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn test_numeric_missing_is_zero() {
        let db = StoreHandle::memory();
        assert_eq!(db.get_i32("nope").await.unwrap(), 0);
        assert_eq!(db.get_i64("nope").await.unwrap(), 0);
        assert_eq!(db.get_u64("nope").await.unwrap(), 0);
        assert_eq!(db.get_f64("nope").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_numeric_parse_error_propagates() {
        let db = StoreHandle::memory();
        db.set("word", "twelve", None).await.unwrap();
        assert!(matches!(db.get_i64("word").await, Err(StoreError::Command { .. })));
        db.set("neg", -1, None).await.unwrap();
        assert!(db.get_u64("neg").await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_type_propagates() {
        let db = StoreHandle::memory();
        db.hset("h", "f", "v").await.unwrap();
        let err = db.get_string("h").await.unwrap_err();
        assert!(err.is_wrong_type());
        assert!(db.get_i64("h").await.unwrap_err().is_wrong_type());
    }

    #[tokio::test]
    async fn test_set_with_expiry() {
        let db = StoreHandle::memory();
        db.set("session", "abc", Some(Duration::from_millis(50))).await.unwrap();

        let pttl = db.pttl("session").await.unwrap();
        assert!(pttl > 0 && pttl <= 50, "pttl was {}", pttl);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!db.exists("session").await.unwrap());
        assert_eq!(db.get_string("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_expiry_means_none() {
        let db = StoreHandle::memory();
        db.set("k", "v", Some(Duration::ZERO)).await.unwrap();
        assert_eq!(db.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_oversized_expiry_is_rejected() {
        let db = StoreHandle::memory();
        let forever = Duration::from_millis(u64::MAX) + Duration::from_millis(6);
        let err = db.set("k", "v", Some(forever)).await.unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(!db.exists("k").await.unwrap());

        // Fits in the request but the store refuses the deadline
        let err = db.set("k", "v", Some(Duration::from_millis(i64::MAX as u64))).await.unwrap_err();
        assert!(err.to_string().contains("invalid expire time"));
        assert!(!db.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let db = StoreHandle::memory();
        assert!(!db.expire("missing", 10).await.unwrap());
        assert_eq!(db.ttl("missing").await.unwrap(), -2);

        db.set("k", "v", None).await.unwrap();
        assert!(db.expire("k", 100).await.unwrap());
        let ttl = db.ttl("k").await.unwrap();
        assert!(ttl > 95 && ttl <= 100, "ttl was {}", ttl);
    }

    #[tokio::test]
    async fn test_pttl_error_propagates() {
        let store = MemoryStore::new();
        let db = StoreHandle::with_transport(store.clone(), ScanOptions::default()).unwrap();
        store.fail_command("PTTL", 1);
        assert!(db.pttl("k").await.is_err());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Token {
        user_id: u64,
        scopes: Vec<String>,
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let db = StoreHandle::memory();
        let token = Token {
            user_id: 7,
            scopes: vec!["read".to_string(), "write".to_string()],
        };
        db.set_json("token:7", &token, None).await.unwrap();

        let back: Option<Token> = db.get_json("token:7").await.unwrap();
        assert_eq!(back, Some(token));

        let raw = db.get_json_bytes("token:7").await.unwrap().unwrap();
        let parsed: HashMap<String, serde_json::Value> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed["user_id"], 7);

        assert_eq!(db.get_json::<Token>("token:none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_json_rejects_garbage() {
        let db = StoreHandle::memory();
        db.set("bad", "{not json", None).await.unwrap();
        assert!(matches!(db.get_json::<Token>("bad").await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_del_is_idempotent() {
        let db = StoreHandle::memory();
        db.set("k", "v", None).await.unwrap();
        assert_eq!(db.del("k").await.unwrap(), 1);
        assert_eq!(db.del("k").await.unwrap(), 0);
        assert_eq!(db.del("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_del() {
        let db = StoreHandle::memory();
        db.set("a", 1, None).await.unwrap();
        db.set("b", 2, None).await.unwrap();
        db.set("c", 3, None).await.unwrap();

        assert_eq!(db.batch_del(&["a", "b", "zz"]).await.unwrap(), 2);
        assert_eq!(db.batch_del(&[]).await.unwrap(), 0);
        assert!(db.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_mset() {
        let db = StoreHandle::memory();
        db.mset(&[("a", "1"), ("b", "2")]).await.unwrap();
        assert_eq!(db.get_string("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(db.get_string("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_mset_failure_writes_nothing() {
        let store = MemoryStore::new();
        let db = StoreHandle::with_transport(store.clone(), ScanOptions::default()).unwrap();
        store.fail_command("MSET", 1);

        assert!(db.mset(&[("a", "1"), ("b", "2")]).await.is_err());
        assert_eq!(db.get_string("a").await.unwrap(), None);
        assert_eq!(db.get_string("b").await.unwrap(), None);
    }
}
