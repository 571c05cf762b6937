//! Storage-card playback source.

use mb_common::error::StorageFault;

/// A job being streamed from the storage card.
pub trait PlaybackSource {
    /// A job is open.
    fn is_playing(&self) -> bool;

    /// More bytes are available.
    fn has_next(&self) -> bool;

    /// Next byte of the job. Only called after `has_next()` returned true.
    fn next_byte(&mut self) -> u8;

    /// Outcome of reading so far. Checked once `has_next()` goes false.
    fn status(&self) -> Result<(), StorageFault>;

    /// Close the job after a clean end of file.
    fn finish(&mut self);
}
