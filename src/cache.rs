//! Building blocks of the memory storage.
//!
//! # Overview
//!
//! - [`PieceTable`] - One [`Piece`] descriptor per piece index, tracking
//!   write progress, completion and the bound buffer slot
//! - [`BufferPool`] - Arena of reusable [`BufferSlot`]s, each bound to at
//!   most one piece
//! - [`MemoryBudget`] - Byte budget to slot count derivation, grow-only
//! - [`PieceSet`] - Bitset over piece indices used for reader interest and
//!   reservations
//!
//! These types carry no locking policy of their own beyond per-slot byte
//! mutexes; [`MemoryStorage`](crate::storage::MemoryStorage) owns the lock
//! that serializes binding changes.
//!
//! # Examples
//!
//! ```
//! use memstore::cache::MemoryBudget;
//!
//! // 64KB budget over 16KB pieces: 4 slots plus 2 of headroom.
//! let mut budget = MemoryBudget::new(64 * 1024, 16 * 1024, 100);
//! assert_eq!(budget.slot_count(), 6);
//!
//! // Budgets only grow.
//! assert_eq!(budget.grow(32 * 1024), None);
//! assert_eq!(budget.grow(128 * 1024), Some(10));
//! ```

mod buffer_pool;
mod memory_budget;
mod piece_set;
mod piece_table;

pub use buffer_pool::{BufferPool, BufferSlot};
pub use memory_budget::MemoryBudget;
pub use piece_set::PieceSet;
pub use piece_table::{Piece, PieceTable};
