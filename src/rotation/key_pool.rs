//! API Key Pool
//!
//! An ordered pool of interchangeable API keys with a shared rotation cursor.

use crate::config::normalize_keys;
use crate::error::{FolioError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A single API key with usage tracking
#[derive(Debug)]
pub struct ApiKey {
    /// The actual API key value
    value: String,

    /// Attempts made with this key
    attempts: AtomicU64,

    /// Attempts with this key that failed
    failures: AtomicU64,
}

impl ApiKey {
    /// Create a new API key
    pub fn new(value: String) -> Self {
        Self {
            value,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Get the key value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Pool of API keys with a process-wide cursor.
///
/// The cursor only moves forward on failure and is never reset, so a later
/// dispatch starts from whichever key last worked (or was last tried).
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<ApiKey>,

    /// Index of the active key; always taken modulo `keys.len()`
    cursor: AtomicUsize,

    /// Total rotations performed since startup
    rotations: AtomicU64,
}

impl KeyPool {
    /// Create a pool from trimmed, non-blank keys; none left is a configuration error
    pub fn new(keys: Vec<String>) -> Result<Self> {
        let keys = normalize_keys(keys);
        if keys.is_empty() {
            return Err(FolioError::Config(
                "key pool requires at least one API key".to_string(),
            ));
        }

        Ok(Self {
            keys: keys.into_iter().map(ApiKey::new).collect(),
            cursor: AtomicUsize::new(0),
            rotations: AtomicU64::new(0),
        })
    }

    /// Number of keys in the pool (never zero)
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Index of the active key
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire) % self.keys.len()
    }

    /// Active key and its index
    pub fn current(&self) -> (usize, &ApiKey) {
        let idx = self.cursor();
        (idx, &self.keys[idx])
    }

    /// Advance the cursor to the next key and return the new index.
    ///
    /// A single-key pool rotates onto itself.
    pub fn rotate(&self) -> usize {
        let len = self.keys.len();
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        self.rotations.fetch_add(1, Ordering::Relaxed);
        (prev + 1) % len
    }

    /// Total rotations performed since startup
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Get statistics about the pool
    pub fn stats(&self) -> KeyPoolStats {
        KeyPoolStats {
            total_keys: self.keys.len(),
            cursor: self.cursor(),
            rotations: self.rotations(),
            total_attempts: self.keys.iter().map(|k| k.attempts()).sum(),
            total_failures: self.keys.iter().map(|k| k.failures()).sum(),
        }
    }
}

/// Statistics about a key pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPoolStats {
    pub total_keys: usize,
    pub cursor: usize,
    pub rotations: u64,
    pub total_attempts: u64,
    pub total_failures: u64,
}
