use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use bytes::BytesMut;
use parking_lot::{Mutex, MutexGuard};

use crate::storage::StorageError;

const NO_PIECE: u32 = u32::MAX;

/// A reusable piece buffer.
///
/// The bytes sit behind the slot's own mutex so copies never touch the
/// storage lock. Binding fields are atomics for lock-free reads; they change
/// only under the storage's exclusive lock.
#[derive(Debug)]
pub struct BufferSlot {
    id: usize,
    data: Mutex<BytesMut>,
    piece: AtomicU32,
    reserved: AtomicBool,
    last_access: AtomicU64,
}

impl BufferSlot {
    fn new(id: usize) -> Self {
        Self {
            id,
            data: Mutex::new(BytesMut::new()),
            piece: AtomicU32::new(NO_PIECE),
            reserved: AtomicBool::new(false),
            last_access: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Piece bound to this slot.
    pub fn piece(&self) -> Option<u32> {
        match self.piece.load(Ordering::Acquire) {
            NO_PIECE => None,
            piece => Some(piece),
        }
    }

    pub fn is_used(&self) -> bool {
        self.piece().is_some()
    }

    /// True if the slot was bound while its piece was reserved. Such slots
    /// were taken out of the slot limit instead of the used count.
    pub fn is_reserved_binding(&self) -> bool {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    pub fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Release);
    }

    /// Locks the slot's bytes.
    pub fn lock(&self) -> MutexGuard<'_, BytesMut> {
        self.data.lock()
    }

    /// Current stored length.
    pub fn stored_len(&self) -> usize {
        self.data.lock().len()
    }

    pub(crate) fn bind(&self, piece: u32, reserved: bool, tick: u64, expected_len: usize) {
        let mut data = self.data.lock();
        data.clear();
        data.reserve(expected_len);
        self.reserved.store(reserved, Ordering::Release);
        self.piece.store(piece, Ordering::Release);
        self.touch(tick);
    }

    /// Clears the binding. The caller holds the data lock and clears it.
    pub(crate) fn unbind(&self, data: &mut BytesMut, tick: u64) {
        data.clear();
        self.piece.store(NO_PIECE, Ordering::Release);
        self.reserved.store(false, Ordering::Release);
        self.touch(tick);
    }
}

/// Arena of buffer slots.
///
/// The arena is sized once for the largest slot count the storage can reach
/// (one slot per piece); growth only raises the active count, so existing
/// slots never move and bindings are undisturbed.
#[derive(Debug)]
pub struct BufferPool {
    slots: Box<[BufferSlot]>,
    active: AtomicUsize,
}

impl BufferPool {
    pub fn new(max_slots: usize, active: usize) -> Self {
        let slots = (0..max_slots).map(BufferSlot::new).collect();
        Self {
            slots,
            active: AtomicUsize::new(active.min(max_slots)),
        }
    }

    /// Number of usable slots.
    pub fn len(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest slot count the pool can grow to.
    pub fn max_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot with the given id.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidSlot` - If `id` is not an active slot
    pub fn slot(&self, id: usize) -> Result<&BufferSlot, StorageError> {
        if id >= self.len() {
            return Err(StorageError::InvalidSlot(id));
        }
        Ok(&self.slots[id])
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferSlot> {
        self.slots[..self.len()].iter()
    }

    /// Lowest-id slot without a binding.
    pub fn first_free(&self) -> Option<&BufferSlot> {
        self.iter().find(|slot| !slot.is_used())
    }

    pub fn bound_count(&self) -> usize {
        self.iter().filter(|slot| slot.is_used()).count()
    }

    /// Activates slots up to `count`. Returns how many were added.
    pub(crate) fn grow_to(&self, count: usize) -> usize {
        let count = count.min(self.max_slots());
        let current = self.len();
        if count <= current {
            return 0;
        }
        self.active.store(count, Ordering::Release);
        count - current
    }

    /// Slot map as `slot:piece` pairs, `-` for free slots.
    pub fn describe(&self) -> String {
        self.iter()
            .map(|slot| match slot.piece() {
                Some(piece) => format!("{}:{}", slot.id(), piece),
                None => format!("{}:-", slot.id()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_is_lowest_id() {
        let pool = BufferPool::new(4, 3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.first_free().unwrap().id(), 0);

        pool.slot(0).unwrap().bind(7, false, 1, 16);
        assert_eq!(pool.first_free().unwrap().id(), 1);
        assert_eq!(pool.bound_count(), 1);
    }

    #[test]
    fn test_slot_bounds() {
        let pool = BufferPool::new(4, 2);
        assert!(pool.slot(1).is_ok());
        assert_eq!(pool.slot(2).unwrap_err(), StorageError::InvalidSlot(2));
    }

    #[test]
    fn test_bind_and_unbind() {
        let pool = BufferPool::new(2, 2);
        let slot = pool.slot(1).unwrap();

        slot.bind(3, true, 5, 1024);
        assert_eq!(slot.piece(), Some(3));
        assert!(slot.is_reserved_binding());
        assert_eq!(slot.last_access(), 5);

        slot.lock().extend_from_slice(&[1, 2, 3]);
        assert_eq!(slot.stored_len(), 3);

        let mut data = slot.lock();
        slot.unbind(&mut data, 6);
        drop(data);
        assert!(!slot.is_used());
        assert!(!slot.is_reserved_binding());
        assert_eq!(slot.stored_len(), 0);
    }

    #[test]
    fn test_grow_to_is_capped() {
        let pool = BufferPool::new(5, 2);
        assert_eq!(pool.grow_to(4), 2);
        assert_eq!(pool.grow_to(3), 0);
        assert_eq!(pool.grow_to(10), 1);
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_describe() {
        let pool = BufferPool::new(3, 3);
        pool.slot(1).unwrap().bind(9, false, 1, 0);
        assert_eq!(pool.describe(), "0:- 1:9 2:-");
    }
}
