/// Host scheduler hooks invoked by the memory storage.
///
/// Eviction throws away downloaded bytes; the scheduler is told so it can
/// forget its progress on the piece and request it again. Calls are made
/// synchronously on the thread that triggered them, after the storage lock
/// has been released, so implementations may call back into the storage.
/// Return values are not observed and failed calls are not retried.
pub trait PieceScheduler: Send + Sync {
    /// The piece's buffer was evicted. Clear any "have" and priority state
    /// for `piece` and re-request its bytes.
    fn piece_evicted(&self, piece: u32);

    /// A read found `piece` unbuffered or incomplete.
    fn piece_unavailable(&self, piece: u32) {
        let _ = piece;
    }
}
