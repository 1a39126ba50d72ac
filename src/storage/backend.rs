use std::io::{IoSlice, IoSliceMut};
use std::path::Path;

use super::error::StorageError;

/// Host-facing piece storage interface.
///
/// Piece data goes through `read_vectored`/`write_vectored`. The file-set
/// operations exist for storages backed by files; the defaults report
/// failure, which is all a memory-only storage can offer. Callers must not
/// expect any durability from a storage that keeps the defaults.
pub trait PieceStorage: Send + Sync {
    /// Marks the storage ready for reads and writes.
    fn initialize(&self) -> Result<(), StorageError>;

    /// Copies piece bytes starting at `offset` into `bufs`.
    /// Returns the number of bytes copied.
    fn read_vectored(
        &self,
        piece: u32,
        offset: usize,
        bufs: &mut [IoSliceMut<'_>],
    ) -> Result<usize, StorageError>;

    /// Stores `bufs` back to back at `offset` within the piece.
    /// Returns the number of bytes stored.
    fn write_vectored(
        &self,
        piece: u32,
        offset: usize,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, StorageError>;

    fn read(&self, piece: u32, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.read_vectored(piece, offset, &mut [IoSliceMut::new(buf)])
    }

    /// Stores `data` at `offset` within `piece`.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidBlockOffset` - If `offset + data.len()` overflows
    /// - `StorageError::AllocationRefused` - If no buffer could be bound
    /// - `StorageError::CapacityExhausted` - If the follow-up trim found nothing
    ///   to evict. The bytes were stored before the trim ran.
    fn write(&self, piece: u32, offset: usize, data: &[u8]) -> Result<usize, StorageError> {
        self.write_vectored(piece, offset, &[IoSlice::new(data)])
    }

    fn has_any_file(&self) -> bool {
        false
    }

    fn rename_file(&self, _index: usize, _new_name: &str) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("rename_file"))
    }

    fn move_storage(&self, _save_path: &Path) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("move_storage"))
    }

    fn delete_files(&self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("delete_files"))
    }

    fn release_files(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn set_file_priority(&self, _priorities: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("set_file_priority"))
    }

    fn write_resume_data(&self) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported("write_resume_data"))
    }

    fn verify_resume_data(&self, _resume_data: &[u8]) -> bool {
        false
    }
}
