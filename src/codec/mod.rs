//! Streaming codecs for compressed entries.
//!
//! A compressed entry is decoded through a [`StreamDecoder`]: the reader
//! pushes small chunks of compressed bytes in with [`sink`](StreamDecoder::sink)
//! and drains whatever the decoder has ready with
//! [`poll`](StreamDecoder::poll). Both sides work on caller-provided buffers,
//! so memory use is bounded by the decoder's own state regardless of the
//! entry's size.

mod heatshrink;

pub use heatshrink::{HeatshrinkDecoder, HeatshrinkEncoder, HeatshrinkParams};

/// Incremental decoder fed from the image and drained into read buffers.
pub trait StreamDecoder: Send {
    /// Offer compressed input; returns how many bytes were accepted.
    ///
    /// May accept fewer bytes than offered (including none) when the
    /// decoder's input buffer is full.
    fn sink(&mut self, input: &[u8]) -> usize;

    /// Write decompressed bytes into `output`; returns how many were written.
    fn poll(&mut self, output: &mut [u8]) -> usize;

    /// Signal end of input. Returns `true` if no buffered state is left.
    fn finish(&mut self) -> bool;

    /// Drop all state and start over as a freshly constructed decoder.
    fn reset(&mut self);
}
