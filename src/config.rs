//! Typed configuration knobs for the pool and reconnect throttle.
//!
//! This crate has no file/env parsing of its own — the embedding
//! application builds these directly — but the knobs are typed structs
//! with `Default` impls rather than stringly-typed globals.
use std::time::Duration;

/// Sizing for [`crate::bufpool::BufferPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Size classes, in bytes, smallest first.
    pub size_classes: Vec<usize>,
    /// Maximum buffers retained per size class.
    pub max_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            size_classes: vec![64, 256, 1024, 4096, 16384, 65536, 262144, 1 << 20],
            max_per_class: 64,
        }
    }
}

/// Parameters for [`crate::reconnect::ExpBackoffReconnect`].
///
/// Defaults are Redis-cluster-friendly: a fast first retry, a cap well
/// under typical client timeouts, and a reset window long enough that a
/// connection which has been healthy for a while doesn't carry forward
/// backoff state from an old, unrelated blip.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub cap: Duration,
    pub reset: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            base: Duration::from_millis(5),
            cap: Duration::from_secs(1),
            reset: Duration::from_secs(30),
        }
    }
}
