//! Sorted sets: members ordered by ascending score, ties broken by member.

use crate::error::Result;
use crate::handle::{log_failure, StoreHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

impl StoreHandle {
    /// ZADD key score member. Inserts `member` or updates its score;
    /// returns true if it was newly added.
    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let added: i64 = log_failure(
            self.query(redis::cmd("ZADD").arg(key).arg(score).arg(member), "ZADD", key)
                .await,
        )?;
        Ok(added > 0)
    }

    /// ZRANK key member: 0-based position in score order, `None` when the
    /// member (or the key) does not exist.
    pub async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        log_failure(self.query(redis::cmd("ZRANK").arg(key).arg(member), "ZRANK", key).await)
    }

    /// ZRANGE key start stop. Both ends inclusive; negative indices count
    /// from the highest score.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        log_failure(
            self.query(redis::cmd("ZRANGE").arg(key).arg(start).arg(stop), "ZRANGE", key)
                .await,
        )
    }

    /// ZRANGE key start stop WITHSCORES
    pub async fn zrange_with_scores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<ScoredMember>> {
        let mut cmd = redis::cmd("ZRANGE");
        cmd.arg(key).arg(start).arg(stop).arg("WITHSCORES");
        let pairs: Vec<(String, f64)> = log_failure(self.query(&cmd, "ZRANGE", key).await)?;
        Ok(pairs
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    /// ZREM key member. Returns true if the member existed.
    pub async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let removed: i64 =
            log_failure(self.query(redis::cmd("ZREM").arg(key).arg(member), "ZREM", key).await)?;
        Ok(removed > 0)
    }
}
