use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::backend::PieceStorage;
use super::error::StorageError;
use super::layout::StorageLayout;
use super::memory::MemoryStorage;
use super::scheduler::PieceScheduler;
use crate::config::StorageConfig;

/// Registry of memory storages keyed by info hash.
///
/// The manager owns the memory budget handed to storages it creates.
/// Raising it with [`StorageManager::set_memory_size`] grows every
/// registered storage as well.
pub struct StorageManager {
    torrents: DashMap<String, Arc<MemoryStorage>>,
    memory_size: AtomicU64,
    verbose: bool,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            torrents: DashMap::new(),
            memory_size: AtomicU64::new(config.memory_size),
            verbose: config.verbose,
        }
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size.load(Ordering::Acquire)
    }

    /// Creates, initializes and registers a storage for `info_hash`.
    /// An existing registration under the same hash is replaced.
    pub fn create(
        &self,
        info_hash: String,
        layout: StorageLayout,
        scheduler: Option<Arc<dyn PieceScheduler>>,
    ) -> Result<Arc<MemoryStorage>, StorageError> {
        let config = StorageConfig {
            memory_size: self.memory_size(),
            verbose: self.verbose,
        };

        let mut storage = MemoryStorage::new(layout, &config);
        if let Some(scheduler) = scheduler {
            storage = storage.with_scheduler(scheduler);
        }
        storage.initialize()?;

        let storage = Arc::new(storage);
        self.torrents.insert(info_hash, Arc::clone(&storage));
        Ok(storage)
    }

    pub fn unregister(&self, info_hash: &str) -> Option<Arc<MemoryStorage>> {
        self.torrents.remove(info_hash).map(|(_, storage)| storage)
    }

    /// Returns the storage registered for `info_hash`.
    ///
    /// # Errors
    ///
    /// - `StorageError::TorrentNotFound` - If nothing is registered under `info_hash`
    pub fn get(&self, info_hash: &str) -> Result<Arc<MemoryStorage>, StorageError> {
        self.torrents
            .get(info_hash)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::TorrentNotFound(info_hash.to_string()))
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }

    pub fn write(
        &self,
        info_hash: &str,
        piece: u32,
        offset: usize,
        data: &[u8],
    ) -> Result<usize, StorageError> {
        self.get(info_hash)?.write(piece, offset, data)
    }

    pub fn read(
        &self,
        info_hash: &str,
        piece: u32,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        self.get(info_hash)?.read(piece, offset, buf)
    }

    /// Raises the budget for new storages and grows every registered one.
    /// Values not above the current budget are ignored.
    pub fn set_memory_size(&self, bytes: u64) {
        if self.memory_size.fetch_max(bytes, Ordering::AcqRel) >= bytes {
            return;
        }

        let storages: Vec<Arc<MemoryStorage>> = self
            .torrents
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for storage in storages {
            storage.set_memory_size(bytes);
        }
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIECE: u32 = 16384;

    fn manager() -> StorageManager {
        StorageManager::new(&StorageConfig::with_memory_size(PIECE as u64))
    }

    #[test]
    fn test_create_and_lookup() {
        let manager = manager();
        let storage = manager
            .create("abc".to_string(), StorageLayout::new(8 * PIECE as u64, PIECE), None)
            .unwrap();

        assert!(storage.is_initialized());
        assert_eq!(manager.len(), 1);
        assert!(Arc::ptr_eq(&storage, &manager.get("abc").unwrap()));
    }

    #[test]
    fn test_unknown_torrent() {
        let manager = manager();
        let mut buf = [0u8; 4];
        assert_eq!(
            manager.read("missing", 0, 0, &mut buf).unwrap_err(),
            StorageError::TorrentNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_write_read_through_manager() {
        let manager = manager();
        manager
            .create("abc".to_string(), StorageLayout::new(2 * PIECE as u64, PIECE), None)
            .unwrap();

        let data = vec![7u8; PIECE as usize];
        assert_eq!(manager.write("abc", 1, 0, &data).unwrap(), data.len());

        let mut buf = vec![0u8; PIECE as usize];
        assert_eq!(manager.read("abc", 1, 0, &mut buf).unwrap(), data.len());
        assert_eq!(buf, data);
    }

    #[test]
    fn test_set_memory_size_grows_registered() {
        let manager = manager();
        let storage = manager
            .create("abc".to_string(), StorageLayout::new(20 * PIECE as u64, PIECE), None)
            .unwrap();
        assert_eq!(storage.stats().slot_count, 3);

        manager.set_memory_size(4 * PIECE as u64);
        assert_eq!(manager.memory_size(), 4 * PIECE as u64);
        assert_eq!(storage.stats().slot_count, 6);

        // Lower values are ignored.
        manager.set_memory_size(PIECE as u64);
        assert_eq!(manager.memory_size(), 4 * PIECE as u64);
        assert_eq!(storage.stats().slot_count, 6);

        let later = manager
            .create("def".to_string(), StorageLayout::new(20 * PIECE as u64, PIECE), None)
            .unwrap();
        assert_eq!(later.stats().slot_count, 6);
    }

    #[test]
    fn test_unregister() {
        let manager = manager();
        manager
            .create("abc".to_string(), StorageLayout::new(PIECE as u64, PIECE), None)
            .unwrap();

        assert!(manager.unregister("abc").is_some());
        assert!(manager.is_empty());
        assert!(manager.get("abc").is_err());
    }
}
