//! Tuning knobs for image scanning and streaming decompression.

/// Options applied to an [`EspFs`](crate::EspFs) and every file opened from it.
///
/// The defaults match the layout produced by the stock image tool: names up
/// to 256 bytes and 16-byte feed chunks into a 16-byte decoder input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the name buffer compared during a directory scan
    pub max_name_len: usize,
    /// Compressed bytes pulled from the image per feed step
    pub feed_chunk: usize,
    /// Input buffer size of each heatshrink decoder
    pub decoder_input_buffer: usize,
    /// Consecutive feed/poll passes without progress before a read is
    /// declared corrupt
    pub stall_limit: u32,
}

impl Config {
    pub const DEFAULT_MAX_NAME_LEN: usize = 256;
    pub const DEFAULT_FEED_CHUNK: usize = 16;
    pub const DEFAULT_DECODER_INPUT_BUFFER: usize = 16;
    pub const DEFAULT_STALL_LIMIT: u32 = 64;

    /// Copy of `self` with every size raised to at least one.
    pub(crate) fn sanitized(self) -> Self {
        Self {
            max_name_len: self.max_name_len.max(1),
            feed_chunk: self.feed_chunk.max(1),
            decoder_input_buffer: self.decoder_input_buffer.max(1),
            stall_limit: self.stall_limit.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_len: Self::DEFAULT_MAX_NAME_LEN,
            feed_chunk: Self::DEFAULT_FEED_CHUNK,
            decoder_input_buffer: Self::DEFAULT_DECODER_INPUT_BUFFER,
            stall_limit: Self::DEFAULT_STALL_LIMIT,
        }
    }
}
