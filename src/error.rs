//! Error types shared across the crate.

use thiserror::Error;

/// Errors surfaced by the AFK pool core and its persistence layer.
///
/// Backend, encode and decode failures mirror the split used by the session
/// repository: database errors map to [`Error::Backend`], serialization of the
/// per-kind reward counters to [`Error::Encode`] / [`Error::Decode`].
#[derive(Debug, Error)]
pub enum Error {
    /// The spatial engine could not be reached when the pool was started.
    ///
    /// The pool cannot function without region membership, so this is fatal.
    #[error("spatial engine unavailable: {0}")]
    SpatialEngineUnavailable(String),

    /// A persistence backend operation failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// A value could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The host failed to apply a reward to a player.
    #[error("grant failed: {0}")]
    Grant(String),
}

/// Convenience alias used by fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
