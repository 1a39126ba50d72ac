use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::storage::{StorageError, StorageLayout};

const NO_SLOT: usize = usize::MAX;

/// Per-piece progress and buffer binding.
///
/// Fields are atomics so the accessors can check binding and progress
/// without the storage lock. They are only mutated while the owning slot's
/// buffer mutex is held, and binding changes additionally require the
/// storage's exclusive lock.
#[derive(Debug)]
pub struct Piece {
    index: u32,
    length: usize,
    written: AtomicUsize,
    complete: AtomicBool,
    read: AtomicBool,
    slot: AtomicUsize,
}

impl Piece {
    fn new(index: u32, length: usize) -> Self {
        Self {
            index,
            length,
            written: AtomicUsize::new(0),
            complete: AtomicBool::new(false),
            read: AtomicBool::new(false),
            slot: AtomicUsize::new(NO_SLOT),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Declared size of the piece.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Bytes written since the piece was last bound. Counts overwrites.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Returns true once the piece was complete and read up to its end.
    pub fn is_read(&self) -> bool {
        self.read.load(Ordering::Acquire)
    }

    /// Slot currently holding this piece's bytes.
    pub fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::Acquire) {
            NO_SLOT => None,
            slot => Some(slot),
        }
    }

    pub fn is_buffered(&self) -> bool {
        self.slot().is_some()
    }

    pub(crate) fn bind(&self, slot: usize) {
        self.slot.store(slot, Ordering::Release);
    }

    /// Records `bytes` written. The piece completes once the written count
    /// and the slot's stored length both reach the declared length.
    ///
    /// Returns true if this call completed the piece.
    pub(crate) fn mark_write(&self, bytes: usize, stored: usize) -> bool {
        let written = self.written.fetch_add(bytes, Ordering::AcqRel) + bytes;
        if written >= self.length && stored >= self.length {
            return !self.complete.swap(true, Ordering::AcqRel);
        }
        false
    }

    /// Marks the piece read if it is complete and `end` reached `stored_end`.
    pub(crate) fn mark_read(&self, end: usize, stored_end: usize) {
        if self.is_complete() && end >= stored_end {
            self.read.store(true, Ordering::Release);
        }
    }

    /// Returns the piece to the unbound state. Only called after its slot
    /// has been released.
    pub(crate) fn reset(&self) {
        self.complete.store(false, Ordering::Release);
        self.read.store(false, Ordering::Release);
        self.written.store(0, Ordering::Release);
        self.slot.store(NO_SLOT, Ordering::Release);
    }
}

/// Fixed table of piece descriptors, one per piece index.
#[derive(Debug)]
pub struct PieceTable {
    pieces: Vec<Piece>,
}

impl PieceTable {
    pub fn new(layout: &StorageLayout) -> Self {
        let pieces = (0..layout.piece_count() as u32)
            .map(|i| Piece::new(i, layout.piece_size(i)))
            .collect();
        Self { pieces }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Returns the piece at `index`.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidPieceIndex` - If `index` is past the last piece
    pub fn piece_at(&self, index: u32) -> Result<&Piece, StorageError> {
        self.pieces
            .get(index as usize)
            .ok_or(StorageError::InvalidPieceIndex(index))
    }

    /// Number of pieces currently bound to a slot.
    pub fn buffered_count(&self) -> usize {
        self.pieces.iter().filter(|p| p.is_buffered()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PieceTable {
        // Three full 16KB pieces and a 1000 byte tail.
        PieceTable::new(&StorageLayout::new(3 * 16384 + 1000, 16384))
    }

    #[test]
    fn test_piece_lengths() {
        let table = table();
        assert_eq!(table.len(), 4);
        assert_eq!(table.piece_at(0).unwrap().length(), 16384);
        assert_eq!(table.piece_at(3).unwrap().length(), 1000);
    }

    #[test]
    fn test_piece_at_out_of_range() {
        let table = table();
        assert_eq!(
            table.piece_at(4).unwrap_err(),
            StorageError::InvalidPieceIndex(4)
        );
    }

    #[test]
    fn test_mark_write_completes_at_length() {
        let table = table();
        let piece = table.piece_at(3).unwrap();
        piece.bind(0);

        assert!(!piece.mark_write(600, 600));
        assert!(!piece.is_complete());
        assert!(piece.mark_write(400, 1000));
        assert!(piece.is_complete());
        assert_eq!(piece.written(), 1000);

        // Completing twice reports only the first transition.
        assert!(!piece.mark_write(10, 1000));
    }

    #[test]
    fn test_rewrite_does_not_complete_short_storage() {
        let table = table();
        let piece = table.piece_at(3).unwrap();
        piece.bind(0);

        piece.mark_write(500, 500);
        piece.mark_write(500, 500);
        assert_eq!(piece.written(), 1000);
        assert!(!piece.is_complete());
    }

    #[test]
    fn test_mark_read_requires_complete_and_end() {
        let table = table();
        let piece = table.piece_at(3).unwrap();
        piece.bind(1);

        piece.mark_read(1000, 1000);
        assert!(!piece.is_read());

        piece.mark_write(1000, 1000);
        piece.mark_read(500, 1000);
        assert!(!piece.is_read());
        piece.mark_read(1000, 1000);
        assert!(piece.is_read());
    }

    #[test]
    fn test_reset() {
        let table = table();
        let piece = table.piece_at(0).unwrap();
        piece.bind(2);
        piece.mark_write(16384, 16384);
        piece.mark_read(16384, 16384);
        assert_eq!(table.buffered_count(), 1);

        piece.reset();
        assert!(!piece.is_complete());
        assert!(!piece.is_read());
        assert_eq!(piece.written(), 0);
        assert_eq!(piece.slot(), None);
        assert_eq!(table.buffered_count(), 0);
    }
}
