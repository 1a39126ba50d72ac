use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage not initialized")]
    NotInitialized,

    #[error("invalid piece index: {0}")]
    InvalidPieceIndex(u32),

    #[error("invalid block offset: piece {piece}, offset {offset}")]
    InvalidBlockOffset { piece: u32, offset: usize },

    #[error("invalid buffer slot: {0}")]
    InvalidSlot(usize),

    #[error("no buffer allocated for piece {0}")]
    AllocationRefused(u32),

    #[error("piece {0} is not buffered")]
    NotBuffered(u32),

    #[error("piece {piece} incomplete: {written} of {length} bytes")]
    IncompletePiece {
        piece: u32,
        written: usize,
        length: usize,
    },

    #[error("capacity exhausted: {used} of {limit} slots used, none evictable [{slots}]")]
    CapacityExhausted {
        used: usize,
        limit: usize,
        slots: String,
    },

    #[error("not supported by memory storage: {0}")]
    Unsupported(&'static str),

    #[error("torrent not registered: {0}")]
    TorrentNotFound(String),
}

impl StorageError {
    /// Returns true if the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::NotInitialized
                | StorageError::AllocationRefused(_)
                | StorageError::NotBuffered(_)
                | StorageError::IncompletePiece { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(StorageError::AllocationRefused(1).is_retryable());
        assert!(
            StorageError::IncompletePiece {
                piece: 1,
                written: 0,
                length: 10
            }
            .is_retryable()
        );
        assert!(!StorageError::InvalidPieceIndex(9).is_retryable());
        assert!(
            !StorageError::InvalidBlockOffset {
                piece: 0,
                offset: usize::MAX
            }
            .is_retryable()
        );
        assert!(
            !StorageError::CapacityExhausted {
                used: 3,
                limit: 3,
                slots: String::new()
            }
            .is_retryable()
        );
        assert!(!StorageError::Unsupported("move_storage").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StorageError::IncompletePiece {
            piece: 2,
            written: 100,
            length: 16384,
        };
        assert_eq!(err.to_string(), "piece 2 incomplete: 100 of 16384 bytes");
    }
}
