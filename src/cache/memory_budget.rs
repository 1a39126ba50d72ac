use crate::constants::SLOT_HEADROOM;

/// Memory budget of a single storage, expressed as a slot count.
///
/// The budget only grows. Each growth recomputes the slot count as
/// `ceil(capacity / piece_length) + SLOT_HEADROOM`, capped at the piece
/// count.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    capacity: u64,
    piece_length: u64,
    piece_count: usize,
    slot_count: usize,
}

impl MemoryBudget {
    pub fn new(capacity: u64, piece_length: u64, piece_count: usize) -> Self {
        let mut budget = Self {
            capacity,
            piece_length: piece_length.max(1),
            piece_count,
            slot_count: 0,
        };
        budget.slot_count = budget.slots_for(capacity);
        budget
    }

    /// Slot count a budget of `capacity` bytes allows.
    pub fn slots_for(&self, capacity: u64) -> usize {
        let slots = capacity.div_ceil(self.piece_length) as usize + SLOT_HEADROOM;
        slots.min(self.piece_count)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Raises the budget to `capacity` bytes.
    ///
    /// Returns the new slot count if it increased. A capacity that is not
    /// larger than the current one is ignored.
    pub fn grow(&mut self, capacity: u64) -> Option<usize> {
        if capacity <= self.capacity {
            return None;
        }
        self.capacity = capacity;

        let slots = self.slots_for(capacity);
        if slots == self.slot_count {
            tracing::info!("Not increasing buffers due to same size ({})", slots);
            return None;
        }

        tracing::info!("Increasing buffers from {} to {}", self.slot_count, slots);
        self.slot_count = slots;
        Some(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIECE: u64 = 16384;

    #[test]
    fn test_initial_slot_count() {
        assert_eq!(MemoryBudget::new(0, PIECE, 100).slot_count(), 2);
        assert_eq!(MemoryBudget::new(PIECE, PIECE, 100).slot_count(), 3);
        assert_eq!(MemoryBudget::new(PIECE + 1, PIECE, 100).slot_count(), 4);
    }

    #[test]
    fn test_slot_count_capped_at_pieces() {
        let budget = MemoryBudget::new(100 * PIECE, PIECE, 4);
        assert_eq!(budget.slot_count(), 4);
    }

    #[test]
    fn test_grow_is_monotonic() {
        let mut budget = MemoryBudget::new(PIECE, PIECE, 100);
        assert_eq!(budget.grow(PIECE), None);
        assert_eq!(budget.grow(PIECE / 2), None);
        assert_eq!(budget.capacity(), PIECE);

        assert_eq!(budget.grow(3 * PIECE), Some(5));
        assert_eq!(budget.grow(3 * PIECE), None);
        assert_eq!(budget.slot_count(), 5);
    }

    #[test]
    fn test_grow_same_slot_count_keeps_capacity() {
        let mut budget = MemoryBudget::new(PIECE, PIECE, 3);
        assert_eq!(budget.grow(10 * PIECE), None);
        assert_eq!(budget.capacity(), 10 * PIECE);
        assert_eq!(budget.slot_count(), 3);
    }
}
