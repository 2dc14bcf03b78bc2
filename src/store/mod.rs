//! Durable frontier store backends
//!
//! The engine never keeps an authoritative in-process copy of the frontier.
//! It holds a handle to a store that offers three logical operations:
//! - `SET-ADD` for deduplication
//! - `LIST-APPEND` for queueing pending work
//! - `LIST-POP-FRONT` for dequeueing one item at a time
//!
//! Backends:
//! - [`MemoryStore`]: process-local, for tests and single-run crawls
//! - [`SqliteStore`]: durable single-host storage (default)
//! - `RedisStore`: shared storage for multiple engine processes (`redis` feature)

mod memory;
#[cfg(feature = "redis")]
mod redis;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use sqlite::SqliteStore;
pub use traits::{FrontierStore, StoreError, StoreResult};

use crate::config::{StoreBackend, StoreConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the store described by the configuration
///
/// # Arguments
///
/// * `config` - The `[store]` configuration section
///
/// # Returns
///
/// * `Ok(Arc<dyn FrontierStore>)` - A shareable store handle
/// * `Err(StoreError)` - The backend could not be opened
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn FrontierStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Sqlite => {
            let path = config.path.as_deref().ok_or_else(|| {
                StoreError::Backend("sqlite backend requires a path".to_string())
            })?;
            Ok(Arc::new(SqliteStore::open(Path::new(path))?))
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let url = config.url.as_deref().ok_or_else(|| {
                StoreError::Backend("redis backend requires a url".to_string())
            })?;
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(StoreError::Backend(
            "redis backend requires building with the `redis` feature".to_string(),
        )),
    }
}
