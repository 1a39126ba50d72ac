//! Configuration for memory storage instances.
//!
//! The memory budget is owned by each storage at construction; there is no
//! process-wide capacity value. Growing a live storage goes through
//! [`MemoryStorage::set_memory_size`](crate::storage::MemoryStorage::set_memory_size).

use crate::constants::{DEFAULT_MEMORY_SIZE, MEMORY_SIZE_ENV, VERBOSE_ENV};

/// Settings applied when a [`MemoryStorage`](crate::storage::MemoryStorage) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Memory budget in bytes. Determines the initial slot count.
    pub memory_size: u64,
    /// Emit per-call read/write traces.
    pub verbose: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            verbose: false,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration with the given memory budget.
    pub fn with_memory_size(memory_size: u64) -> Self {
        Self {
            memory_size,
            ..Default::default()
        }
    }

    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(size) = std::env::var(MEMORY_SIZE_ENV) {
            if let Ok(bytes) = size.parse::<u64>() {
                config.memory_size = bytes;
            }
        }

        if let Ok(verbose) = std::env::var(VERBOSE_ENV) {
            config.verbose = verbose.parse().unwrap_or(false);
        }

        config
    }

    /// Creates a small configuration for tests: a single piece worth of
    /// 16KB budget with verbose traces on.
    pub fn for_testing() -> Self {
        Self {
            memory_size: 16 * 1024,
            verbose: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = StorageConfig::default();
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);
        assert!(!config.verbose);
    }

    #[test]
    fn test_with_memory_size() {
        let config = StorageConfig::with_memory_size(1024);
        assert_eq!(config.memory_size, 1024);
        assert!(!config.verbose);
    }

    #[test]
    fn test_testing_preset() {
        let config = StorageConfig::for_testing();
        assert_eq!(config.memory_size, 16 * 1024);
        assert!(config.verbose);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var(MEMORY_SIZE_ENV, "65536");
            std::env::set_var(VERBOSE_ENV, "true");
        }

        let config = StorageConfig::from_env();
        assert_eq!(config.memory_size, 65536);
        assert!(config.verbose);

        unsafe {
            std::env::set_var(MEMORY_SIZE_ENV, "not-a-number");
            std::env::remove_var(VERBOSE_ENV);
        }

        let config = StorageConfig::from_env();
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);
        assert!(!config.verbose);

        unsafe {
            std::env::remove_var(MEMORY_SIZE_ENV);
        }
    }
}
