//! Pool configuration types.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shortest reclaim interval the watcher accepts.
pub const MIN_RECLAIM_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`Pool`](crate::Pool).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Maximum number of resources the pool will keep allocated.
    /// Requests beyond that wait until a borrow is returned.
    pub max_size: usize,
    /// Period on which the reclaim watcher evaluates idle surplus.
    ///
    /// Shorter intervals shed idle capacity more aggressively; tune it
    /// to how bursty the workload is.
    pub reclaim_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            reclaim_interval: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_size < 1 {
            return Err(Error::configuration("max_size must be at least 1"));
        }
        if self.reclaim_interval < MIN_RECLAIM_INTERVAL {
            return Err(Error::configuration(format!(
                "reclaim_interval must be at least {}ms",
                MIN_RECLAIM_INTERVAL.as_millis()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 50);
        assert_eq!(config.reclaim_interval, Duration::from_secs(10));
        config.validate().unwrap();
    }

    #[test]
    fn zero_max_size_rejected() {
        let config = PoolConfig {
            max_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn sub_minimum_reclaim_interval_rejected() {
        let config = PoolConfig {
            reclaim_interval: Duration::from_millis(99),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            reclaim_interval: MIN_RECLAIM_INTERVAL,
            ..Default::default()
        };
        config.validate().unwrap();
    }
}
