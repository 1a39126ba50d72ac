/// Piece geometry of a torrent.
///
/// All pieces share `piece_length` except the final one, which holds the
/// remainder of `total_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    total_length: u64,
    piece_length: u32,
    piece_count: usize,
}

impl StorageLayout {
    pub fn new(total_length: u64, piece_length: u32) -> Self {
        let piece_length = piece_length.max(1);
        Self {
            total_length,
            piece_length,
            piece_count: total_length.div_ceil(piece_length as u64) as usize,
        }
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn piece_length(&self) -> u32 {
        self.piece_length
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    /// Size of the piece at `index`, or 0 past the last piece.
    pub fn piece_size(&self, index: u32) -> usize {
        let index = index as usize;
        if index >= self.piece_count {
            return 0;
        }
        if index == self.piece_count - 1 {
            let rem = self.total_length % self.piece_length as u64;
            if rem != 0 {
                return rem as usize;
            }
        }
        self.piece_length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_layout() {
        let layout = StorageLayout::new(65536, 16384);
        assert_eq!(layout.piece_count(), 4);
        assert_eq!(layout.piece_size(3), 16384);
        assert_eq!(layout.piece_size(4), 0);
    }

    #[test]
    fn test_short_final_piece() {
        let layout = StorageLayout::new(20000, 16384);
        assert_eq!(layout.piece_count(), 2);
        assert_eq!(layout.piece_size(0), 16384);
        assert_eq!(layout.piece_size(1), 3616);
    }

    #[test]
    fn test_empty_layout() {
        let layout = StorageLayout::new(0, 16384);
        assert_eq!(layout.piece_count(), 0);
        assert_eq!(layout.piece_size(0), 0);
    }
}
