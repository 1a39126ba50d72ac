//! memstore - In-memory piece storage for BitTorrent streaming
//!
//! This library keeps torrent pieces in a bounded set of memory buffers
//! instead of on disk. It serves partial reads and writes against those
//! buffers and evicts them under memory pressure, taking into account which
//! pieces active readers still need and which are reserved.
//!
//! # Modules
//!
//! - [`storage`] - Memory storage engine, eviction and the host-facing interface
//! - [`cache`] - Piece table, buffer slots, memory budget and piece sets
//! - [`config`] - Storage configuration with environment overrides
//! - [`constants`] - Sizing constants
//! - [`logging`] - Optional tracing subscriber setup

pub mod cache;
pub mod config;
pub mod constants;
pub mod logging;
pub mod storage;

pub use cache::{BufferPool, BufferSlot, MemoryBudget, Piece, PieceSet, PieceTable};
pub use config::StorageConfig;
pub use storage::{
    MemoryStorage, PieceScheduler, PieceStorage, PoolStats, StorageError, StorageLayout,
    StorageManager,
};
