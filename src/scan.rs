//! Cursor-based key discovery and prefix enumeration.
//!
//! `SCAN` walks the keyspace in pages; cursor 0 both starts a walk and,
//! when returned by the store, ends it. Discovery and value fetching are
//! separate round trips, so a key can vanish in between; what happens then
//! is governed by [`MissingKeyPolicy`].

use std::collections::HashMap;

use crate::config::{MissingKeyPolicy, ScanOptions};
use crate::error::{Result, StoreError};
use crate::glob;
use crate::handle::{log_failure, StoreHandle};

impl StoreHandle {
    /// SCAN cursor MATCH pattern COUNT count: one page of the walk.
    /// Returns the next cursor and the keys found on this page.
    pub async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(count);
        self.query(&cmd, "SCAN", pattern).await
    }

    /// Every key matching `pattern`, gathered by walking SCAN to the end.
    /// Keys are not deduplicated: the store may report a key twice if the
    /// keyspace changes mid-walk.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let page_size = self.scan_options().page_size;
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let (next, page) = self
                .scan(cursor, pattern, page_size)
                .await
                .map_err(|e| StoreError::scan(pattern, e))?;
            keys.extend(page);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    /// KEYS pattern. Blocks the store for the whole keyspace; prefer
    /// [`scan_keys`](Self::scan_keys) outside of small or test databases.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        log_failure(self.query(redis::cmd("KEYS").arg(pattern), "KEYS", pattern).await)
    }

    /// Lazily enumerate the values of every key starting with `prefix`,
    /// one SCAN page at a time, using the handle's scan options.
    pub fn prefix_scan(&self, prefix: &str) -> PrefixScan {
        self.prefix_scan_with(prefix, self.scan_options().clone())
    }

    pub fn prefix_scan_with(&self, prefix: &str, options: ScanOptions) -> PrefixScan {
        PrefixScan {
            handle: self.clone(),
            prefix: prefix.to_string(),
            pattern: glob::prefix_pattern(prefix),
            options,
            cursor: 0,
            finished: false,
        }
    }

    /// Map of `key with prefix removed -> value` for every key starting
    /// with `prefix`. Any failure fails the whole call; nothing partial is
    /// returned. If a suffix shows up twice the later value wins.
    pub async fn list_all_values_with_prefix(&self, prefix: &str) -> Result<HashMap<String, String>> {
        self.list_all_values_with_prefix_with(prefix, self.scan_options().clone())
            .await
    }

    pub async fn list_all_values_with_prefix_with(
        &self,
        prefix: &str,
        options: ScanOptions,
    ) -> Result<HashMap<String, String>> {
        let deadline = options.deadline;
        let mut pages = self.prefix_scan_with(prefix, options);

        let collect = async move {
            let mut values = HashMap::new();
            while let Some(page) = pages.next_page().await? {
                values.extend(page);
            }
            Ok::<_, StoreError>(values)
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, collect)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => collect.await,
        }
    }
}

/// Incremental prefix enumeration. Holds at most one page of results;
/// dropping it stops the walk.
#[derive(Debug)]
pub struct PrefixScan {
    handle: StoreHandle,
    prefix: String,
    pattern: String,
    options: ScanOptions,
    cursor: u64,
    finished: bool,
}

impl PrefixScan {
    /// The `MATCH` pattern sent to the store
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next SCAN page and the values of its keys as
    /// `(suffix, value)` pairs. A page can be empty while more pages
    /// follow. Returns `None` once the walk is complete.
    ///
    /// After an error the walk is over and later calls return `None`.
    pub async fn next_page(&mut self) -> Result<Option<Vec<(String, String)>>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.fetch_page().await;
        if result.is_err() {
            self.finished = true;
        }
        result.map(Some)
    }

    async fn fetch_page(&mut self) -> Result<Vec<(String, String)>> {
        let (next, keys) = self
            .handle
            .scan(self.cursor, &self.pattern, self.options.page_size)
            .await
            .map_err(|e| StoreError::scan(self.pattern.as_str(), e))?;
        tracing::debug!(
            "SCAN {} cursor {} -> {} ({} keys)",
            self.pattern,
            self.cursor,
            next,
            keys.len()
        );

        let mut page = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match self.handle.get_string(&key).await {
                Ok(Some(value)) => value,
                Ok(None) => match self.options.on_missing {
                    MissingKeyPolicy::Abort => {
                        let missing = StoreError::NotFound { key: key.clone() };
                        return Err(StoreError::scan(key, missing));
                    }
                    MissingKeyPolicy::Skip => {
                        tracing::debug!("Key {} vanished before its value was read, skipping", key);
                        continue;
                    }
                },
                Err(e) => return Err(StoreError::scan(key, e)),
            };

            match key.strip_prefix(self.prefix.as_str()) {
                Some(suffix) => page.push((suffix.to_string(), value)),
                None => tracing::warn!("SCAN {} returned non-matching key {}", self.pattern, key),
            }
        }

        self.cursor = next;
        self.finished = next == 0;
        Ok(page)
    }
}
