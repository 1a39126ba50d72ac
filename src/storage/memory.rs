//! In-memory piece storage with reader-aware eviction.
//!
//! A [`MemoryStorage`] keeps a bounded number of piece buffers. Pieces are
//! bound to a free buffer slot on their first write and stay bound until
//! the pool saturates and a trim evicts them. Eviction prefers pieces no
//! reader is waiting for, never touches reserved pieces, and tells the host
//! scheduler to download the evicted piece again.
//!
//! # Locking
//!
//! One `RwLock` guards binding changes, the eviction scan and the membership
//! sets. Byte copies take only the bound slot's own mutex, then re-check that
//! the slot still belongs to the piece, since a trim may have evicted it
//! between lookup and copy.

use std::io::{IoSlice, IoSliceMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use super::backend::PieceStorage;
use super::error::StorageError;
use super::layout::StorageLayout;
use super::scheduler::PieceScheduler;
use crate::cache::{BufferPool, BufferSlot, MemoryBudget, Piece, PieceSet, PieceTable};
use crate::config::StorageConfig;
use crate::constants::PIECE_SET_SLACK;

/// State guarded by the storage lock.
struct Control {
    budget: MemoryBudget,
    reader_pieces: PieceSet,
    reserved_pieces: PieceSet,
    reserved_count: usize,
}

/// Snapshot of the buffer pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Memory budget in bytes.
    pub capacity_bytes: u64,
    /// Number of buffer slots.
    pub slot_count: usize,
    /// Slots available to non-reserved pieces.
    pub slot_limit: usize,
    /// Slots bound to non-reserved pieces.
    pub used: usize,
    /// Size of the reserved set.
    pub reserved_count: usize,
    /// Slots bound to any piece.
    pub bound_slots: usize,
}

/// Memory-only piece storage.
pub struct MemoryStorage {
    layout: StorageLayout,
    pieces: PieceTable,
    buffers: BufferPool,
    control: RwLock<Control>,
    /// Read without the lock for the saturation check; written under it.
    used: AtomicUsize,
    limit: AtomicUsize,
    clock: AtomicU64,
    initialized: AtomicBool,
    reading: AtomicBool,
    verbose: AtomicBool,
    scheduler: Option<Arc<dyn PieceScheduler>>,
}

impl MemoryStorage {
    /// Creates an uninitialized storage for `layout` with the memory budget
    /// from `config`. Call [`PieceStorage::initialize`] before use.
    pub fn new(layout: StorageLayout, config: &StorageConfig) -> Self {
        let piece_count = layout.piece_count();
        let budget = MemoryBudget::new(
            config.memory_size,
            layout.piece_length() as u64,
            piece_count,
        );
        let slot_count = budget.slot_count();

        tracing::info!(
            "Init with mem size {}, pieces: {}, piece length: {}, using {} buffers",
            config.memory_size,
            piece_count,
            layout.piece_length(),
            slot_count
        );

        Self {
            layout,
            pieces: PieceTable::new(&layout),
            buffers: BufferPool::new(piece_count, slot_count),
            control: RwLock::new(Control {
                budget,
                reader_pieces: PieceSet::new(piece_count + PIECE_SET_SLACK),
                reserved_pieces: PieceSet::new(piece_count + PIECE_SET_SLACK),
                reserved_count: 0,
            }),
            used: AtomicUsize::new(0),
            limit: AtomicUsize::new(slot_count),
            clock: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            reading: AtomicBool::new(false),
            verbose: AtomicBool::new(config.verbose),
            scheduler: None,
        }
    }

    /// Sets the scheduler notified about evicted and unavailable pieces.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn PieceScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns the piece descriptor at `index`.
    pub fn piece(&self, index: u32) -> Result<&Piece, StorageError> {
        self.pieces.piece_at(index)
    }

    /// Returns the buffer slot with the given id.
    pub fn slot(&self, id: usize) -> Result<&BufferSlot, StorageError> {
        self.buffers.slot(id)
    }

    pub fn enable_logging(&self) {
        self.verbose.store(true, Ordering::Relaxed);
    }

    pub fn disable_logging(&self) {
        self.verbose.store(false, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Raises the memory budget to `bytes` and adds buffer slots if the
    /// larger budget allows more. Smaller or equal budgets are ignored.
    ///
    /// Returns the slot count after the call.
    pub fn set_memory_size(&self, bytes: u64) -> usize {
        if bytes <= self.control.read().budget.capacity() {
            return self.buffers.len();
        }

        let mut control = self.control.write();
        if let Some(count) = control.budget.grow(bytes) {
            let added = self.buffers.grow_to(count);
            self.limit.fetch_add(added, Ordering::AcqRel);
        }
        self.buffers.len()
    }

    /// Replaces the set of pieces active readers still need.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotInitialized` - If the storage is not initialized
    pub fn set_reader_pieces(&self, pieces: &[u32]) -> Result<(), StorageError> {
        self.ensure_ready()?;

        let mut control = self.control.write();
        let rejected = control
            .reader_pieces
            .replace(pieces.iter().map(|&p| p as usize));
        if !rejected.is_empty() {
            tracing::warn!("Ignoring reader pieces out of range: {:?}", rejected);
        }
        Ok(())
    }

    /// Replaces the set of pieces pinned against eviction.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotInitialized` - If the storage is not initialized
    pub fn set_reserved_pieces(&self, pieces: &[u32]) -> Result<(), StorageError> {
        self.ensure_ready()?;

        let mut control = self.control.write();
        let rejected = control
            .reserved_pieces
            .replace(pieces.iter().map(|&p| p as usize));
        if !rejected.is_empty() {
            tracing::warn!("Ignoring reserved pieces out of range: {:?}", rejected);
        }
        control.reserved_count = control.reserved_pieces.len();
        Ok(())
    }

    pub fn is_reader_piece(&self, index: u32) -> bool {
        self.control.read().reader_pieces.contains(index as usize)
    }

    pub fn is_reserved(&self, index: u32) -> bool {
        self.control.read().reserved_pieces.contains(index as usize)
    }

    /// Reads up to `len` bytes of a complete piece starting at `offset`.
    /// `len` is capped at the piece length.
    pub fn read_block(&self, piece: u32, offset: usize, len: usize) -> Result<Bytes, StorageError> {
        self.ensure_ready()?;
        let len = len.min(self.pieces.piece_at(piece)?.length());
        let mut buf = vec![0u8; len];
        let n = self.read(piece, offset, &mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    pub fn stats(&self) -> PoolStats {
        let control = self.control.read();
        PoolStats {
            capacity_bytes: control.budget.capacity(),
            slot_count: self.buffers.len(),
            slot_limit: self.limit.load(Ordering::Acquire),
            used: self.used.load(Ordering::Acquire),
            reserved_count: control.reserved_count,
            bound_slots: self.buffers.bound_count(),
        }
    }

    /// Slot map as `slot:piece` pairs.
    pub fn buffer_info(&self) -> String {
        self.buffers.describe()
    }

    /// True when every slot available to non-reserved pieces is bound.
    pub fn is_saturated(&self) -> bool {
        self.used.load(Ordering::Acquire) >= self.limit.load(Ordering::Acquire)
    }

    /// Evicts buffers until the pool has headroom again. `excluded` is never
    /// evicted.
    ///
    /// Evicted pieces are reported to the scheduler once the lock is
    /// released, including when the trim fails part way.
    ///
    /// # Errors
    ///
    /// - `StorageError::CapacityExhausted` - If the pool is saturated and no
    ///   bound slot may be evicted
    pub fn trim(&self, excluded: Option<u32>) -> Result<(), StorageError> {
        if !self.is_saturated() {
            return Ok(());
        }

        let mut evicted = Vec::new();
        let result = {
            let control = self.control.write();
            self.trim_locked(&control, excluded, &mut evicted)
        };

        for piece in evicted {
            self.notify_evicted(piece);
        }
        result
    }

    fn trim_locked(
        &self,
        control: &Control,
        excluded: Option<u32>,
        evicted: &mut Vec<u32>,
    ) -> Result<(), StorageError> {
        while self.is_saturated() {
            tracing::info!(
                "Trimming {} to {} with reserved {}, {}",
                self.used.load(Ordering::Acquire),
                self.limit.load(Ordering::Acquire),
                control.reserved_count,
                self.buffers.describe()
            );

            if !control.reader_pieces.is_empty() {
                if let Some(slot) = self.find_lru_slot(control, excluded, true) {
                    tracing::info!(
                        "Removing unread piece {:?} from buffer {}",
                        slot.piece(),
                        slot.id()
                    );
                    evicted.extend(self.evict(slot));
                    continue;
                }
            }

            if let Some(slot) = self.find_lru_slot(control, excluded, false) {
                tracing::info!(
                    "Removing LRU piece {:?} from buffer {}",
                    slot.piece(),
                    slot.id()
                );
                evicted.extend(self.evict(slot));
                continue;
            }

            let used = self.used.load(Ordering::Acquire);
            let limit = self.limit.load(Ordering::Acquire);
            let slots = self.buffers.describe();
            tracing::error!(
                "No evictable buffer: used {} of {}, reserved {}, excluded {:?}, slots [{}]",
                used,
                limit,
                control.reserved_count,
                excluded,
                slots
            );
            return Err(StorageError::CapacityExhausted { used, limit, slots });
        }
        Ok(())
    }

    /// Least recently accessed slot that may be evicted. Ties go to the
    /// lowest slot id.
    fn find_lru_slot(
        &self,
        control: &Control,
        excluded: Option<u32>,
        skip_reader_pieces: bool,
    ) -> Option<&BufferSlot> {
        self.buffers
            .iter()
            .filter(|slot| match slot.piece() {
                Some(piece) => {
                    Some(piece) != excluded
                        && !control.reserved_pieces.contains(piece as usize)
                        && !(skip_reader_pieces && control.reader_pieces.contains(piece as usize))
                }
                None => false,
            })
            .min_by_key(|slot| slot.last_access())
    }

    /// Releases `slot` and resets its piece. Caller holds the write lock.
    fn evict(&self, slot: &BufferSlot) -> Option<u32> {
        let mut data = slot.lock();
        let piece = slot.piece()?;

        if slot.is_reserved_binding() {
            self.limit.fetch_add(1, Ordering::AcqRel);
        } else {
            self.used.fetch_sub(1, Ordering::AcqRel);
        }
        slot.unbind(&mut data, self.tick());

        if let Ok(p) = self.pieces.piece_at(piece) {
            p.reset();
        }
        tracing::info!("Freed buffer {} and piece {}", slot.id(), piece);
        Some(piece)
    }

    /// Returns the slot bound to `piece`, binding a free one for writes.
    ///
    /// Reads never allocate. Writes are refused while the reader gate is
    /// active and no reader wants the piece, or when no slot is free.
    fn ensure_binding(&self, piece: &Piece, for_write: bool) -> Option<&BufferSlot> {
        if let Some(slot) = piece.slot() {
            return self.buffers.slot(slot).ok();
        }

        if !for_write {
            // A concurrent writer may be binding this piece right now.
            let _control = self.control.read();
            return piece.slot().and_then(|slot| self.buffers.slot(slot).ok());
        }

        let control = self.control.write();
        if let Some(slot) = piece.slot() {
            return self.buffers.slot(slot).ok();
        }

        let index = piece.index();
        if self.reading.load(Ordering::Acquire) && !control.reader_pieces.contains(index as usize)
        {
            if self.is_verbose() {
                tracing::debug!("Piece {} is not wanted by any reader", index);
            }
            return None;
        }

        let Some(slot) = self.buffers.first_free() else {
            tracing::debug!("No free buffer for piece {}", index);
            return None;
        };

        let reserved = control.reserved_pieces.contains(index as usize);
        slot.bind(index, reserved, self.tick(), piece.length());
        piece.bind(slot.id());

        // Reserved pieces hold their slot for good, so they shrink the limit
        // instead of counting as used.
        if reserved {
            self.limit.fetch_sub(1, Ordering::AcqRel);
        } else {
            self.used.fetch_add(1, Ordering::AcqRel);
        }

        tracing::info!("Setting buffer {} to piece {}", slot.id(), index);
        Some(slot)
    }

    fn write_bufs(
        &self,
        index: u32,
        offset: usize,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, StorageError> {
        self.ensure_ready()?;
        let piece = self.pieces.piece_at(index)?;
        let size: usize = bufs.iter().map(|b| b.len()).sum();
        let end = offset
            .checked_add(size)
            .ok_or(StorageError::InvalidBlockOffset {
                piece: index,
                offset,
            })?;

        if self.is_verbose() {
            tracing::debug!("Write piece {}, offset {}, {} bytes", index, offset, size);
        }

        loop {
            let Some(slot) = self.ensure_binding(piece, true) else {
                if self.is_verbose() {
                    tracing::debug!("No write buffer for piece {}", index);
                }
                return Err(StorageError::AllocationRefused(index));
            };

            let mut data = slot.lock();
            if piece.slot() != Some(slot.id()) {
                // Evicted between lookup and lock.
                continue;
            }

            if data.len() < end {
                data.resize(end, 0);
            }

            let mut cursor = offset;
            for buf in bufs {
                data[cursor..cursor + buf.len()].copy_from_slice(buf);
                cursor += buf.len();
            }

            if piece.mark_write(size, data.len()) {
                tracing::debug!("Piece {} complete in buffer {}", index, slot.id());
            }
            slot.touch(self.tick());
            break;
        }

        if self.is_saturated() {
            if let Err(err) = self.trim(Some(index)) {
                tracing::error!(
                    "Piece {}: {} bytes stored at offset {} but trim failed: {}",
                    index,
                    size,
                    offset,
                    err
                );
                return Err(err);
            }
        }
        Ok(size)
    }

    fn read_bufs(
        &self,
        index: u32,
        offset: usize,
        bufs: &mut [IoSliceMut<'_>],
    ) -> Result<usize, StorageError> {
        self.ensure_ready()?;
        let piece = self.pieces.piece_at(index)?;
        self.reading.store(true, Ordering::Release);

        if self.is_verbose() {
            let size: usize = bufs.iter().map(|b| b.len()).sum();
            tracing::debug!("Read piece {}, offset {}, {} bytes", index, offset, size);
        }

        let result = match self.ensure_binding(piece, false) {
            Some(slot) => self.copy_out(piece, slot, offset, bufs),
            None => Err(StorageError::NotBuffered(index)),
        };

        if let Err(err) = &result {
            tracing::debug!("Read miss for piece {}, offset {}: {}", index, offset, err);
            self.notify_unavailable(index);
        }
        result
    }

    fn copy_out(
        &self,
        piece: &Piece,
        slot: &BufferSlot,
        offset: usize,
        bufs: &mut [IoSliceMut<'_>],
    ) -> Result<usize, StorageError> {
        let data = slot.lock();
        if piece.slot() != Some(slot.id()) {
            return Err(StorageError::NotBuffered(piece.index()));
        }
        if !piece.is_complete() {
            return Err(StorageError::IncompletePiece {
                piece: piece.index(),
                written: piece.written(),
                length: piece.length(),
            });
        }

        let stored_end = piece.written().min(data.len()).min(piece.length());
        if offset >= stored_end {
            return Ok(0);
        }

        let size: usize = bufs.iter().map(|b| b.len()).sum();
        let available = (stored_end - offset).min(size);

        let mut src = &data[offset..offset + available];
        for buf in bufs.iter_mut() {
            if src.is_empty() {
                break;
            }
            let n = buf.len().min(src.len());
            buf[..n].copy_from_slice(&src[..n]);
            src = &src[n..];
        }

        piece.mark_read(offset + available, stored_end);
        slot.touch(self.tick());
        Ok(available)
    }

    fn notify_evicted(&self, piece: u32) {
        if let Some(scheduler) = &self.scheduler {
            tracing::info!("Restoring piece {}", piece);
            scheduler.piece_evicted(piece);
        }
    }

    fn notify_unavailable(&self, piece: u32) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.piece_unavailable(piece);
        }
    }

    fn ensure_ready(&self) -> Result<(), StorageError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl PieceStorage for MemoryStorage {
    fn initialize(&self) -> Result<(), StorageError> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn read_vectored(
        &self,
        piece: u32,
        offset: usize,
        bufs: &mut [IoSliceMut<'_>],
    ) -> Result<usize, StorageError> {
        self.read_bufs(piece, offset, bufs)
    }

    fn write_vectored(
        &self,
        piece: u32,
        offset: usize,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, StorageError> {
        self.write_bufs(piece, offset, bufs)
    }
}
