//! Bounded resource pool with demand-driven idle reclamation.
//!
//! A [`Pool`] owns up to `max_size` expensive, reusable resources
//! (think database connections) built by a [`Factory`]. `acquire`
//! hands out the head of the idle queue, creates a new resource while
//! under the cap, or waits for a release. A background watcher
//! compares demand against the idle surplus once per interval and
//! closes one idle resource per tick when the pool is running ahead of
//! its callers.
//!
//! Borrows travel as [`Handle`]s: guarded proxies that refuse access
//! once the resource has been returned or the pool has shut down, and
//! that return the resource on drop.
//!
//! ```
//! use reservoir::testing::TestFactory;
//! use reservoir::{Pool, PoolConfig, Resource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> reservoir::Result<()> {
//! let pool = Pool::new(TestFactory::default(), PoolConfig::default())?;
//!
//! let handle = pool.acquire().await?;
//! assert!(handle.get()?.is_open());
//! handle.release().await;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod pool;
mod reclaim;
pub mod resource;
pub mod testing;

pub use config::{MIN_RECLAIM_INTERVAL, PoolConfig};
pub use error::{CloseError, Error, Result};
pub use handle::Handle;
pub use pool::{Pool, PoolStats};
pub use resource::{Factory, Resource};
