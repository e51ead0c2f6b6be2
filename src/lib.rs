//! Redcache - typed access facade over a Redis-compatible key-value store
//!
//! # Example
//!
//! ```
//! use redcache::StoreHandle;
//!
//! tokio_test::block_on(async {
//!     // In production: StoreHandle::open(StoreConfig::from_env()?).await?
//!     let db = StoreHandle::memory();
//!
//!     db.set("user:1", "ada", None).await.unwrap();
//!     db.set("user:2", "grace", None).await.unwrap();
//!     assert_eq!(db.get_string("user:1").await.unwrap().as_deref(), Some("ada"));
//!
//!     let users = db.list_all_values_with_prefix("user:").await.unwrap();
//!     assert_eq!(users["2"], "grace");
//! });
//! ```

pub mod config;
pub mod error;
pub mod glob;
pub mod handle;
pub mod hash;
pub mod list;
pub mod memory;
pub mod scalar;
pub mod scan;
pub mod transport;
pub mod zset;

pub use config::{MissingKeyPolicy, ScanOptions, StoreConfig};
pub use error::{Result, StoreError};
pub use handle::StoreHandle;
pub use memory::MemoryStore;
pub use scan::PrefixScan;
pub use transport::{RedisTransport, Transport};
pub use zset::ScoredMember;
