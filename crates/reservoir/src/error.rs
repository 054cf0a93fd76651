//! Error types for pool operations.

use thiserror::Error;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-visible error for pool operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is invalid. Raised synchronously, before
    /// any pool state is touched.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the requested value.
        message: String,
    },

    /// The factory could not produce a new resource. Surfaced to the
    /// `acquire` caller as-is; the pool never retries internally.
    #[error("failed to connect a new resource")]
    Connect {
        /// The factory's underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The pool cannot serve the request: it has shut down, or the
    /// caller gave up waiting for a resource.
    #[error("pool unavailable: {reason}")]
    Unavailable {
        /// Why no resource could be handed out.
        reason: String,
    },

    /// A handle was used after its resource was returned to the pool,
    /// or after the pool shut down.
    #[error("handle is no longer backed by a live resource")]
    InvalidState,
}

impl Error {
    /// Create a configuration error.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a factory failure.
    pub fn connect<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Connect {
            source: source.into(),
        }
    }

    /// Create an unavailability error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Error reported by [`Resource::close`](crate::Resource::close).
///
/// Kept separate from [`Error`] on purpose: teardown failures are
/// best-effort noise. Pool paths that close resources (release of a
/// broken resource, watcher eviction, shutdown) log and discard it
/// rather than surfacing it to callers.
#[derive(Error, Debug)]
#[error("resource did not close cleanly")]
pub struct CloseError {
    /// The underlying teardown error.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl CloseError {
    /// Wrap an underlying teardown error.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            source: source.into(),
        }
    }
}
