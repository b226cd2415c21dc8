//! Size-classed recycled buffer pool backing decoded bulk strings.
//!
//! Mirrors `redis/byteslice.Pool` from the original implementation: a small
//! number of size classes, each holding a freelist of previously-used
//! buffers. `get` rounds a request up to the smallest class that fits;
//! `put` returns a buffer to its class, or drops it silently if it doesn't
//! belong to any class.
use dashmap::DashMap;

use crate::config::PoolConfig;

/// Size classes, in bytes. A request larger than the biggest class bypasses
/// the pool entirely (allocated fresh, and dropped rather than pooled on
/// `put`) so the pool can't retain unbounded memory for one-off huge bulks.
const DEFAULT_SIZE_CLASSES: &[usize] = &[64, 256, 1024, 4096, 16384, 65536, 262144, 1 << 20];

/// Maximum number of buffers retained per size class.
const DEFAULT_MAX_PER_CLASS: usize = 64;

/// A concurrent, size-classed freelist of `Vec<u8>` buffers.
///
/// Safe to share across many producers: each class is an independent
/// `DashMap` entry, so `get`/`put` on different classes never contend.
pub struct BufferPool {
    size_classes: Vec<usize>,
    max_per_class: usize,
    classes: DashMap<usize, Vec<Vec<u8>>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool {
            size_classes: DEFAULT_SIZE_CLASSES.to_vec(),
            max_per_class: DEFAULT_MAX_PER_CLASS,
            classes: DashMap::new(),
        }
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool from a caller-supplied [`PoolConfig`] instead of the
    /// built-in defaults.
    pub fn with_config(cfg: &PoolConfig) -> Self {
        BufferPool {
            size_classes: cfg.size_classes.clone(),
            max_per_class: cfg.max_per_class,
            classes: DashMap::new(),
        }
    }

    fn class_for(&self, n: usize) -> Option<usize> {
        self.size_classes.iter().copied().find(|&c| c >= n)
    }

    /// Returns a buffer of length exactly `n` (content undefined, reused
    /// buffers are truncated/resized as needed). Buffers beyond the
    /// largest size class are allocated fresh and never pooled.
    pub fn get(&self, n: usize) -> Vec<u8> {
        let Some(class) = self.class_for(n) else {
            return vec![0u8; n];
        };

        let mut buf = self
            .classes
            .get_mut(&class)
            .and_then(|mut freelist| freelist.pop())
            .unwrap_or_else(|| Vec::with_capacity(class));
        buf.resize(n, 0);
        buf
    }

    /// Returns `b` to its size class, dropping it if it doesn't match any
    /// class exactly or the class is already at capacity. Never panics on
    /// a double-put or an out-of-class buffer.
    pub fn put(&self, b: Vec<u8>) {
        let Some(&class) = self.size_classes.iter().find(|&&c| c == b.capacity()) else {
            return;
        };
        let mut freelist = self.classes.entry(class).or_default();
        if freelist.len() < self.max_per_class {
            freelist.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_buffer_of_requested_length() {
        let pool = BufferPool::new();
        let buf = pool.get(10);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn put_then_get_recycles_the_allocation() {
        let pool = BufferPool::new();
        let buf = pool.get(100);
        let ptr = buf.as_ptr();
        pool.put(buf);
        let buf2 = pool.get(100);
        assert_eq!(buf2.as_ptr(), ptr);
    }

    #[test]
    fn double_put_is_a_safe_no_op() {
        let pool = BufferPool::new();
        let buf = pool.get(10);
        pool.put(buf.clone());
        pool.put(buf);
    }

    #[test]
    fn oversized_buffer_bypasses_the_pool() {
        let pool = BufferPool::new();
        let huge = pool.get(2 << 20);
        assert_eq!(huge.len(), 2 << 20);
        pool.put(huge);
        assert!(pool.classes.is_empty());
    }

    #[test]
    fn class_is_bounded() {
        let pool = BufferPool::new();
        for _ in 0..(DEFAULT_MAX_PER_CLASS + 10) {
            pool.put(pool.get(10));
        }
        assert!(pool.classes.get(&64).unwrap().len() <= DEFAULT_MAX_PER_CLASS);
    }

    #[test]
    fn with_config_uses_custom_classes() {
        let cfg = PoolConfig {
            size_classes: vec![8, 32],
            max_per_class: 2,
        };
        let pool = BufferPool::with_config(&cfg);
        let buf = pool.get(5);
        assert_eq!(buf.capacity(), 8);
    }
}
