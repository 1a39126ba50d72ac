//! Storage constants and tuning parameters.
//!
//! This module contains the sizing rules used by the memory storage engine
//! and the environment variable names read by [`crate::config`].

// ============================================================================
// Memory budget
// ============================================================================

/// Default memory budget for a storage instance (32MB)
pub const DEFAULT_MEMORY_SIZE: u64 = 32 * 1024 * 1024;

/// Extra slots allocated above `ceil(capacity / piece_length)`.
/// Absorbs transient over-allocation while a trim is racing new writes.
pub const SLOT_HEADROOM: usize = 2;

/// Extra bits kept past the last piece index in membership sets.
pub const PIECE_SET_SLACK: usize = 10;

// ============================================================================
// Environment overrides
// ============================================================================

/// Memory budget override in bytes
pub const MEMORY_SIZE_ENV: &str = "MEMSTORE_MEMORY_SIZE";

/// Enables verbose per-call read/write diagnostics
pub const VERBOSE_ENV: &str = "MEMSTORE_VERBOSE";
