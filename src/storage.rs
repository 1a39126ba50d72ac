//! Memory-only piece storage.
//!
//! This module stands in for disk storage in a download pipeline: pieces are
//! assembled in memory from block writes and served back to readers, and
//! buffers are recycled under memory pressure.
//!
//! # Components
//!
//! - [`MemoryStorage`] - Per-torrent storage with buffer binding and eviction
//! - [`StorageManager`] - Registry of storages keyed by info hash
//! - [`PieceStorage`] - Host-facing storage interface
//! - [`PieceScheduler`] - Hooks the host scheduler implements to learn about
//!   evicted pieces
//! - [`StorageLayout`] - Piece count and sizes of a torrent
//!
//! # Eviction
//!
//! Every write checks whether the buffer pool is saturated. If it is, the
//! least recently accessed piece is evicted, preferring pieces outside the
//! current reader interest. Reserved pieces and the piece just written are
//! never evicted. The scheduler is told about every evicted piece so it can
//! download it again.
//!
//! # Examples
//!
//! ```
//! use memstore::config::StorageConfig;
//! use memstore::storage::{MemoryStorage, PieceStorage, StorageLayout};
//!
//! # fn example() -> Result<(), memstore::storage::StorageError> {
//! let layout = StorageLayout::new(4 * 16384, 16384);
//! let storage = MemoryStorage::new(layout, &StorageConfig::with_memory_size(16384));
//! storage.initialize()?;
//!
//! let block = vec![1u8; 16384];
//! storage.write(0, 0, &block)?;
//!
//! let mut buf = vec![0u8; 16384];
//! assert_eq!(storage.read(0, 0, &mut buf)?, 16384);
//! assert_eq!(buf, block);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Durability
//!
//! Nothing survives a restart. File-set operations on [`PieceStorage`]
//! (rename, move, delete, resume data, file priorities) report failure.

mod backend;
mod error;
mod layout;
mod manager;
mod memory;
mod scheduler;

pub use backend::PieceStorage;
pub use error::StorageError;
pub use layout::StorageLayout;
pub use manager::StorageManager;
pub use memory::{MemoryStorage, PoolStats};
pub use scheduler::PieceScheduler;
